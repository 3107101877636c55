use hashpass::embed::{embedded_path, find_embedded, find_embedded_in_name, EmbedOptions};
use honggfuzz::fuzz;
use std::path::Path;

fn main() {
    loop {
        fuzz!(|data: &[u8]| {
            let Ok(name) = std::str::from_utf8(data) else {
                return;
            };
            if find_embedded_in_name(name).is_some() {
                return;
            }
            if name.is_empty() || name.contains(['/', '\\', '\0']) || name == "." || name == ".." {
                return;
            }
            let crc = data.iter().fold(0u32, |acc, b| acc.rotate_left(5) ^ *b as u32);
            let renamed = embedded_path(Path::new(name), crc, &EmbedOptions::default());
            assert_eq!(find_embedded(&renamed), Some(crc));
        });
    }
}
