//! Firmware identity from `/sys/class/dmi/id/`.

use std::path::Path;

use tracing::trace;

use crate::collector::traits::FileSystem;
use crate::model::{BiosInfo, BoardInfo};

/// Default location of the DMI identity files on Linux.
pub const DEFAULT_DMI_PATH: &str = "/sys/class/dmi/id";

/// Reads BIOS and mainboard identity strings.
///
/// Every field is the trimmed first line of its file; a missing or
/// unreadable file yields an empty string.
#[derive(Debug, Clone)]
pub struct DmiCollector<F: FileSystem> {
    fs: F,
    dmi_path: String,
}

impl<F: FileSystem> DmiCollector<F> {
    pub fn new(fs: F, dmi_path: impl Into<String>) -> Self {
        Self {
            fs,
            dmi_path: dmi_path.into(),
        }
    }

    fn first_line(&self, name: &str) -> String {
        let path = format!("{}/{}", self.dmi_path, name);
        match self.fs.read_to_string(Path::new(&path)) {
            Ok(content) => content.lines().next().unwrap_or("").trim().to_string(),
            Err(e) => {
                trace!("{} unavailable: {}", path, e);
                String::new()
            }
        }
    }

    pub fn bios(&self) -> BiosInfo {
        BiosInfo {
            vendor: self.first_line("bios_vendor"),
            version: self.first_line("bios_version"),
            date: self.first_line("bios_date"),
        }
    }

    pub fn board(&self) -> BoardInfo {
        BoardInfo {
            name: self.first_line("board_name"),
            vendor: self.first_line("board_vendor"),
            version: self.first_line("board_version"),
            serial: self.first_line("board_serial"),
            asset_tag: self.first_line("board_asset_tag"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;

    #[test]
    fn test_bios() {
        let dmi = DmiCollector::new(MockFs::typical_host(), DEFAULT_DMI_PATH);

        let bios = dmi.bios();
        assert_eq!(bios.vendor, "American Megatrends Inc.");
        assert_eq!(bios.version, "3.1a");
        assert_eq!(bios.date, "05/24/2019");
    }

    #[test]
    fn test_board_missing_serial_is_empty() {
        let dmi = DmiCollector::new(MockFs::typical_host(), DEFAULT_DMI_PATH);

        let board = dmi.board();
        assert_eq!(board.name, "X11DPi-N");
        assert_eq!(board.vendor, "Supermicro");
        assert_eq!(board.version, "1.10");
        assert_eq!(board.serial, "");
        assert_eq!(board.asset_tag, "Default string");
    }

    #[test]
    fn test_only_first_line_is_used() {
        let mut fs = MockFs::new();
        fs.add_file("/dmi/board_name", "  Main Board \nsecond line\n");

        let dmi = DmiCollector::new(fs, "/dmi");
        assert_eq!(dmi.board().name, "Main Board");
    }

    #[test]
    fn test_no_dmi_directory() {
        let dmi = DmiCollector::new(MockFs::new(), DEFAULT_DMI_PATH);
        assert_eq!(dmi.bios(), BiosInfo::default());
        assert_eq!(dmi.board(), BoardInfo::default());
    }
}
