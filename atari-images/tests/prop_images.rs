use atari_images::{Density, DiskImage, MemVolume, SECTOR_SIZE_SD};
use proptest::prelude::*;

const SECTOR_COUNT: u32 = 720;

fn blank_sd_atr() -> DiskImage {
    let mut data = vec![0u8; 16];
    data[0] = 0x96;
    data[1] = 0x02;
    data[4] = 0x80; // 128-byte sectors
    data.resize(16 + (SECTOR_COUNT * SECTOR_SIZE_SD) as usize, 0);
    DiskImage::mount(Box::new(MemVolume::with_data(data)), "blank.atr").unwrap()
}

proptest! {
    // Every write lands exactly where a re-read expects it, independent of
    // the order writes arrive in.
    #[test]
    fn prop_write_read_roundtrip(
        writes in prop::collection::vec((1u32..=SECTOR_COUNT, any::<u8>()), 1..40)
    ) {
        let mut image = blank_sd_atr();
        for &(sector, fill) in &writes {
            image.write_sector(sector, &[fill; 128]).unwrap();
        }

        // last write per sector wins
        for &(sector, _) in &writes {
            let fill = writes
                .iter()
                .rev()
                .find(|(s, _)| *s == sector)
                .map(|(_, f)| *f)
                .unwrap();
            let mut buf = [0u8; 128];
            image.read_sector(sector, &mut buf).unwrap();
            prop_assert_eq!(buf, [fill; 128]);
        }
    }

    // Formatting is idempotent: a second format changes nothing.
    #[test]
    fn prop_format_idempotent(
        writes in prop::collection::vec((1u32..=SECTOR_COUNT, any::<u8>()), 0..20),
        enhanced in any::<bool>(),
    ) {
        let density = if enhanced { Density::Enhanced } else { Density::Single };

        let mut once = blank_sd_atr();
        for &(sector, fill) in &writes {
            once.write_sector(sector, &[fill; 128]).unwrap();
        }
        once.format(density).unwrap();

        let mut twice = blank_sd_atr();
        twice.format(density).unwrap();
        twice.format(density).unwrap();

        let count = once.sector_count() as u32;
        prop_assert_eq!(count, twice.sector_count() as u32);
        let mut a = [0u8; 128];
        let mut b = [0u8; 128];
        for sector in 1..=count {
            once.read_sector(sector, &mut a).unwrap();
            twice.read_sector(sector, &mut b).unwrap();
            prop_assert_eq!(a, b);
            prop_assert_eq!(a, [0u8; 128]);
        }
    }
}
