// Resource files on disk: save/load symmetry and MacBinary II detection
// through real files.

use emmac::memory::MemoryRegion;
use emmac::records::os_type;
use emmac::rsrc::{
    macbinary_checksum, MacBinaryHeader, Resource, ResourceFile, ResourceGroup,
    MACBINARY_HEADER_SIZE,
};

fn sample_file() -> ResourceFile {
    ResourceFile::from_groups(vec![
        ResourceGroup::new(
            os_type(b"CODE"),
            vec![
                Resource::new(0, 0, String::new(), MemoryRegion::from_vec("c0", vec![0; 24])),
                Resource::new(1, 0, String::new(), MemoryRegion::from_vec("c1", vec![0xA9, 0xF4])),
            ],
        ),
        ResourceGroup::new(
            os_type(b"STR "),
            vec![Resource::new(
                0,
                0,
                "Version".to_string(),
                MemoryRegion::from_vec("s", vec![5, b'h', b'e', b'l', b'l', b'o']),
            )],
        ),
    ])
}

#[test]
fn save_and_load_through_the_filesystem() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.rsrc");

    sample_file().save(&path).unwrap();
    let loaded = ResourceFile::load(&path).unwrap();

    assert_eq!(loaded.groups().len(), 2);
    assert_eq!(loaded.find(os_type(b"CODE"), 1).unwrap().size(), 2);
    let named = loaded.find_by_name(os_type(b"STR "), "Version").unwrap();
    assert_eq!(named.id(), 0);
    assert_eq!(named.data().read_pstr(0).unwrap(), "hello");

    // Byte-exact: saving the reloaded file reproduces the original bytes.
    let original = std::fs::read(&path).unwrap();
    assert_eq!(loaded.serialize().unwrap(), original);
}

#[test]
fn macbinary_wrapped_file_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.bin");

    let fork = sample_file().serialize().unwrap();
    let wrapped = MemoryRegion::new("bin", MACBINARY_HEADER_SIZE + fork.len());
    wrapped.write_pstr(1, "Sample App").unwrap();
    wrapped.write_bytes(65, b"APPL").unwrap();
    wrapped.write_bytes(69, b"EMAC").unwrap();
    wrapped.write_u32(87, fork.len() as u32).unwrap();
    let crc = macbinary_checksum(&wrapped).unwrap();
    wrapped.write_u16(124, crc).unwrap();
    wrapped.write_bytes(MACBINARY_HEADER_SIZE, &fork).unwrap();

    let bytes = wrapped.read_bytes(0, MACBINARY_HEADER_SIZE + fork.len()).unwrap();
    std::fs::write(&path, &bytes).unwrap();

    let header = MacBinaryHeader::parse(&MemoryRegion::from_vec("check", bytes)).unwrap();
    assert!(header.is_valid);

    let loaded = ResourceFile::load(&path).unwrap();
    assert_eq!(loaded.find(os_type(b"CODE"), 1).unwrap().data().read_u16(0).unwrap(), 0xA9F4);
}
