use serde::{Deserialize, Serialize};

/// rwx rights for user, group and other; each field holds three bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionBits {
    pub user: u8,
    pub group: u8,
    pub other: u8,
}

impl PermissionBits {
    pub fn new(user: u8, group: u8, other: u8) -> Self {
        Self {
            user: user & 0o7,
            group: group & 0o7,
            other: other & 0o7,
        }
    }

    /// Low nine bits of a POSIX mode; file-type bits are ignored.
    pub fn from_mode(mode: u32) -> Self {
        Self::new(
            ((mode >> 6) & 0o7) as u8,
            ((mode >> 3) & 0o7) as u8,
            (mode & 0o7) as u8,
        )
    }

    /// `ls -l` style string such as `drwxr-xr-x`.
    pub fn format(&self, is_dir: bool) -> String {
        let mut s = String::with_capacity(10);
        s.push(if is_dir { 'd' } else { '-' });
        for bits in [self.user, self.group, self.other] {
            s.push(if bits & 0o4 != 0 { 'r' } else { '-' });
            s.push(if bits & 0o2 != 0 { 'w' } else { '-' });
            s.push(if bits & 0o1 != 0 { 'x' } else { '-' });
        }
        s
    }
}

/// Format optional rights; absent rights render as all dashes.
pub fn format_permissions(bits: Option<PermissionBits>, is_dir: bool) -> String {
    match bits {
        Some(bits) => bits.format(is_dir),
        None => "----------".to_string(),
    }
}
