// The strip table stands in for the full detector geometry: one row per
// scintillator strip, carrying everything the front-end simulation needs to
// know about it. Strips are keyed by (module, strip) packed into a u64.
//
// The FEB mapping is fixed by the cabling of each module type:
// [type, module, strip] -> (mac5, channel(s))
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use fxhash::FxHashMap;

use super::aux_det::{AuxDetGeometry, AuxDetType, Axis, CrtRegion, StripGeo};
use super::constants::MINOS_DUAL_READOUT_OFFSET;
use super::error::StripTableError;
use super::vector::Vector3;

const ENTRIES_PER_LINE: usize = 14; //adid,adsid,type,region,layer,stack,cx,cy,cz,hw,hh,hl,length axis,width axis

/// Generate a unique id number for a given strip
pub fn generate_strip_key(adid: u32, adsid: u32) -> u64 {
    ((adid as u64) << 32) | (adsid as u64)
}

/// StripTable contains the geometry of every CRT strip, indexed by module and strip id.
///
/// The table is read from a CSV file with a header row followed by one row per strip:
///
/// ```csv
/// adid,adsid,type,region,layer,stack,cx,cy,cz,half_width,half_height,half_length,length_axis,width_axis
/// ```
#[derive(Debug, Clone, Default)]
pub struct StripTable {
    map: FxHashMap<u64, StripGeo>,
}

impl StripTable {
    /// Load the table from a CSV file
    pub fn new(path: &Path) -> Result<Self, StripTableError> {
        let mut contents = String::new();
        let mut file = File::open(path)?;
        file.read_to_string(&mut contents)?;
        Self::from_csv(&contents)
    }

    pub fn from_csv(contents: &str) -> Result<Self, StripTableError> {
        let mut table = StripTable::default();

        let mut lines = contents.lines();
        lines.next(); // Skip the header
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            let entries: Vec<&str> = line.split_terminator(',').map(|e| e.trim()).collect();
            if entries.len() != ENTRIES_PER_LINE {
                return Err(StripTableError::BadFileFormat);
            }

            let strip = StripGeo {
                adid: entries[0].parse()?,
                adsid: entries[1].parse()?,
                det_type: AuxDetType::from_str(entries[2])?,
                region: CrtRegion::from_str(entries[3])?,
                layer: entries[4].parse()?,
                stack: entries[5].parse()?,
                center: Vector3::new(entries[6].parse()?, entries[7].parse()?, entries[8].parse()?),
                half_width: entries[9].parse()?,
                half_height: entries[10].parse()?,
                half_length: entries[11].parse()?,
                length_axis: Axis::from_str(entries[12])?,
                width_axis: Axis::from_str(entries[13])?,
            };
            // The strip frame needs three distinct axes
            if strip.length_axis == strip.width_axis {
                return Err(StripTableError::BadFileFormat);
            }

            let key = generate_strip_key(strip.adid, strip.adsid);
            if table.map.contains_key(&key) {
                return Err(StripTableError::DuplicateStrip(strip.adid, strip.adsid));
            }
            table.map.insert(key, strip);
        }

        Ok(table)
    }

    pub fn insert(&mut self, strip: StripGeo) -> Option<StripGeo> {
        self.map
            .insert(generate_strip_key(strip.adid, strip.adsid), strip)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl AuxDetGeometry for StripTable {
    fn strip(&self, adid: u32, adsid: u32) -> Option<&StripGeo> {
        self.map.get(&generate_strip_key(adid, adsid))
    }
}

/// Front-end board address of a strip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FebAddress {
    pub mac5: u32,
    pub channel0: u32,
    /// Second fibre of a CERN strip
    pub channel1: Option<u32>,
}

impl FebAddress {
    /// The board reading the far end of a MINOS strip
    pub fn dual_mac5(&self) -> u32 {
        self.mac5 + MINOS_DUAL_READOUT_OFFSET
    }
}

/// Map a strip to its front-end board and channels
pub fn feb_address(det_type: AuxDetType, adid: u32, adsid: u32) -> FebAddress {
    match det_type {
        AuxDetType::Cern => FebAddress {
            mac5: adid,
            channel0: 2 * adsid,
            channel1: Some(2 * adsid + 1),
        },
        AuxDetType::Dc => FebAddress {
            mac5: adid,
            channel0: adsid,
            channel1: None,
        },
        // Three MINOS modules share one board, two strips per channel
        AuxDetType::Minos => FebAddress {
            mac5: adid / 3,
            channel0: adsid / 2 + 10 * (adid % 3),
            channel1: None,
        },
    }
}

//Unit tests
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TABLE: &str = "adid,adsid,type,region,layer,stack,cx,cy,cz,half_width,half_height,half_length,length_axis,width_axis
4,1,c,Top,0,0,0.0,620.0,0.0,11.5,0.75,92.0,z,x
4,2,c,Top,1,0,0.0,622.0,0.0,11.5,0.75,92.0,x,z
10,5,m,Left,1,2,-480.0,0.0,700.0,2.05,0.5,400.0,y,z
";

    #[test]
    fn test_load_table() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("strips.csv");
        let mut file = File::create(&path).expect("file");
        file.write_all(TABLE.as_bytes()).expect("write");

        let table = StripTable::new(&path).expect("valid table");
        assert_eq!(table.len(), 3);
        let strip = table.strip(10, 5).expect("strip exists");
        assert_eq!(strip.det_type, AuxDetType::Minos);
        assert_eq!(strip.region, CrtRegion::Left);
        assert_eq!(strip.stack, 2);
        assert_eq!(strip.length_axis, Axis::Y);
        assert!(table.strip(10, 6).is_none());
    }

    #[test]
    fn test_bad_tables() {
        let short = "header\n4,1,c,Top,0,0,0.0,620.0,0.0\n";
        assert!(matches!(
            StripTable::from_csv(short),
            Err(StripTableError::BadFileFormat)
        ));
        let bad_type = "header\n4,1,q,Top,0,0,0.0,620.0,0.0,11.5,0.75,92.0,z,x\n";
        assert!(matches!(
            StripTable::from_csv(bad_type),
            Err(StripTableError::BadKeyword(_))
        ));
        let duplicate = format!("{TABLE}4,1,c,Top,0,0,0.0,620.0,0.0,11.5,0.75,92.0,z,x\n");
        assert!(matches!(
            StripTable::from_csv(&duplicate),
            Err(StripTableError::DuplicateStrip(4, 1))
        ));
        assert!(StripTable::new(Path::new("/not/a/table.csv")).is_err());
    }

    #[test]
    fn test_strip_axes_must_differ() {
        let same_axes = "header\n4,1,c,Top,0,0,0.0,620.0,0.0,11.5,0.75,92.0,z,z\n";
        assert!(matches!(
            StripTable::from_csv(same_axes),
            Err(StripTableError::BadFileFormat)
        ));
    }

    #[test]
    fn test_feb_addresses() {
        let c = feb_address(AuxDetType::Cern, 12, 7);
        assert_eq!((c.mac5, c.channel0, c.channel1), (12, 14, Some(15)));
        let d = feb_address(AuxDetType::Dc, 200, 9);
        assert_eq!((d.mac5, d.channel0, d.channel1), (200, 9, None));
        let m = feb_address(AuxDetType::Minos, 29, 13);
        assert_eq!((m.mac5, m.channel0), (9, 26));
        assert_eq!(m.dual_mac5(), 59);
    }
}
