// SPDX-License-Identifier: Apache-2.0

/// A known binary file-format magic prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub format: &'static str,
    pub magic: &'static [u8],
}

impl Signature {
    #[must_use]
    pub const fn new(format: &'static str, magic: &'static [u8]) -> Self {
        Self { format, magic }
    }

    #[must_use]
    pub fn matches(&self, bytes: &[u8]) -> bool {
        bytes.starts_with(self.magic)
    }

    #[must_use]
    pub fn magic_hex(&self) -> String {
        self.magic.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Built-in catalog. Entries are kept as shipped, duplicates included
/// (`.zip`/`.docx`, `.exe`/`.dll`), so scan order is stable across releases.
pub const BUILTIN_SIGNATURES: &[Signature] = &[
    Signature::new(".bmp", &[0x42, 0x4d]),
    Signature::new(".fits", &[0x53, 0x49, 0x4d, 0x50, 0x4c, 0x45]),
    Signature::new(".gif", &[0x47, 0x49, 0x46, 0x38]),
    Signature::new(".gks", &[0x47, 0x4b, 0x53, 0x4d]),
    Signature::new(".rgb", &[0x01, 0xda]),
    Signature::new(".itc", &[0xf1, 0x00, 0x40, 0xbb]),
    Signature::new(".jpg", &[0xff, 0xd8, 0xff, 0xe0]),
    Signature::new(".nif", &[0x49, 0x49, 0x4e, 0x31]),
    Signature::new(".pm", &[0x56, 0x49, 0x45, 0x57]),
    Signature::new(".png", &[0x89, 0x50, 0x4e, 0x47]),
    Signature::new(".eps", &[0x25, 0x21]),
    Signature::new(".ras", &[0x59, 0xa6, 0x6a, 0x95]),
    Signature::new(".tif (motorola)", &[0x4d, 0x4d, 0x00, 0x2a]),
    // Second byte is 0x31, not the 0x49 of the canonical "II*\0" header.
    Signature::new(".tif (intel)", &[0x49, 0x31, 0x2a, 0x00]),
    Signature::new(
        ".xcf",
        &[0x67, 0x69, 0x6d, 0x70, 0x20, 0x78, 0x63, 0x66, 0x20, 0x76],
    ),
    Signature::new(".fig", &[0x23, 0x46, 0x49, 0x47]),
    Signature::new(".xpm", &[0x2f, 0x2a, 0x20, 0x58, 0x50, 0x4d, 0x20, 0x2a, 0x2f]),
    Signature::new(".bz", &[0x42, 0x5a]),
    Signature::new(".Z", &[0x1f, 0x9d]),
    Signature::new(".gz", &[0x1f, 0x8b]),
    Signature::new(".zip", &[0x50, 0x4b, 0x03, 0x04]),
    Signature::new(".tar", &[0x75, 0x73, 0x74, 0x61, 0x72]),
    Signature::new(".exe", &[0x4d, 0x5a]),
    Signature::new(".elf", &[0x7f, 0x45, 0x4c, 0x46]),
    Signature::new(".class", &[0xca, 0xfe, 0xba, 0xbe]),
    Signature::new(".ico", &[0x00, 0x00, 0x01, 0x00]),
    Signature::new(".avi", &[0x52, 0x49, 0x46, 0x46]),
    Signature::new(".swf", &[0x46, 0x57, 0x53]),
    Signature::new(".flv", &[0x46, 0x4c, 0x56]),
    Signature::new(
        ".mp4",
        &[0x00, 0x00, 0x00, 0x18, 0x66, 0x74, 0x79, 0x70, 0x6d, 0x70, 0x34, 0x32],
    ),
    Signature::new(".mov", &[0x6d, 0x6f, 0x6f, 0x76]),
    Signature::new(".wmv", &[0x30, 0x26, 0xb2, 0x75, 0x8e, 0x66, 0xcf]),
    Signature::new(".msi", &[0xd0, 0xcf, 0x11, 0xe0, 0xa1, 0xb1, 0x1a, 0xe1]),
    Signature::new(".obj", &[0x4c, 0x01]),
    Signature::new(".dll", &[0x4d, 0x5a]),
    Signature::new(".cab", &[0x4d, 0x53, 0x43, 0x46]),
    Signature::new(".rar", &[0x52, 0x61, 0x72, 0x21, 0x1a, 0x07, 0x00]),
    Signature::new(".pdf", &[0x25, 0x50, 0x44, 0x46]),
    Signature::new(".docx", &[0x50, 0x4b, 0x03, 0x04]),
    Signature::new(
        ".jar",
        &[0x50, 0x4b, 0x03, 0x04, 0x14, 0x00, 0x08, 0x00, 0x08, 0x00],
    ),
    Signature::new(".zlib", &[0x78, 0x9c]),
];

#[must_use]
pub fn shortest_magic_len(catalog: &[Signature]) -> usize {
    catalog.iter().map(|s| s.magic.len()).min().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_keeps_every_shipped_entry() {
        assert_eq!(BUILTIN_SIGNATURES.len(), 41);
        assert!(BUILTIN_SIGNATURES.iter().all(|s| !s.magic.is_empty()));
        assert_eq!(shortest_magic_len(BUILTIN_SIGNATURES), 2);
    }

    #[test]
    fn duplicated_prefixes_are_not_collapsed() {
        let mz = BUILTIN_SIGNATURES
            .iter()
            .filter(|s| s.magic == [0x4d, 0x5a])
            .count();
        let zip = BUILTIN_SIGNATURES
            .iter()
            .filter(|s| s.magic == [0x50, 0x4b, 0x03, 0x04])
            .count();
        assert_eq!(mz, 2);
        assert_eq!(zip, 2);
    }

    #[test]
    fn magic_hex_is_lowercase_and_padded() {
        let png = BUILTIN_SIGNATURES
            .iter()
            .find(|s| s.format == ".png")
            .expect("png entry");
        assert_eq!(png.magic_hex(), "89504e47");
        let rgb = Signature::new(".rgb", &[0x01, 0xda]);
        assert_eq!(rgb.magic_hex(), "01da");
    }
}
