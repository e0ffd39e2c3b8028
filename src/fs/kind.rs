//! Display classification of directory entries.

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "svg", "webp"];

/// Lower-cased extension without the dot. A leading dot does not start an
/// extension, so `.bashrc` has none.
pub fn extension(name: &str) -> String {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name[idx + 1..].to_lowercase(),
        _ => String::new(),
    }
}

/// Human-readable kind label, e.g. "PNG Image" or "Folder".
pub fn file_kind(name: &str, is_dir: bool) -> String {
    if is_dir {
        return "Folder".to_string();
    }

    let ext = extension(name);
    let known = match ext.as_str() {
        "jpg" | "jpeg" => "JPEG Image",
        "png" => "PNG Image",
        "gif" => "GIF Image",
        "svg" => "SVG Image",
        "webp" => "WebP Image",
        "mp4" => "MP4 Video",
        "mov" => "QuickTime Movie",
        "avi" => "AVI Video",
        "mp3" => "MP3 Audio",
        "wav" => "WAV Audio",
        "m4a" => "M4A Audio",
        "pdf" => "PDF Document",
        "doc" | "docx" => "Word Document",
        "txt" => "Text Document",
        "md" => "Markdown Document",
        "js" => "JavaScript File",
        "ts" => "TypeScript File",
        "py" => "Python File",
        "java" => "Java File",
        "cpp" => "C++ File",
        "html" => "HTML Document",
        "css" => "CSS Stylesheet",
        "json" => "JSON File",
        "zip" => "ZIP Archive",
        "rar" => "RAR Archive",
        "tar" => "TAR Archive",
        "gz" => "GZIP Archive",
        "" => return "File".to_string(),
        _ => return format!("{} File", ext.to_uppercase()),
    };
    known.to_string()
}

pub fn is_image(name: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&extension(name).as_str())
}

pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// MIME type used for image previews.
pub fn image_mime(name: &str) -> &'static str {
    match extension(name).as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        _ => "image/png",
    }
}
