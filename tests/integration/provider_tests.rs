use dupesieve::config::Settings;
use dupesieve::stats::file::{FileProvider, SIZE};
use dupesieve::stats::image::{ImageProvider, DIMENSIONS, IMG_HASH};
use dupesieve::stats::media::DURATION;
use dupesieve::stats::validate::validate_provider;
use dupesieve::stats::{
    Fingerprint, HashKey, ProviderError, Registry, RegistryError, Stat, StatMap, StatProvider,
    StatValue,
};
use image::{Rgb, RgbImage};
use std::path::Path;
use tempfile::tempdir;

fn flipped(bits: &[usize]) -> Fingerprint {
    let mut bytes = [0b1010_1010u8; 8];
    for bit in bits {
        bytes[bit / 8] ^= 1 << (bit % 8);
    }
    Fingerprint::from_bytes(&bytes)
}

fn matches_at(threshold: f64, a: &Fingerprint, b: &Fingerprint) -> bool {
    let registry = Settings {
        threshold,
        ..Settings::default()
    }
    .build_registry()
    .unwrap();
    registry.is_match(
        IMG_HASH,
        &HashKey::Fingerprint(a.clone()),
        &HashKey::Fingerprint(b.clone()),
    )
}

#[test]
fn test_fingerprint_threshold() {
    let base = flipped(&[]);
    let near = flipped(&[0, 17, 63]);
    assert_eq!(base.distance(&near), Some(3));

    assert!(matches_at(95.0, &base, &near));
    assert!(!matches_at(97.0, &base, &near));
    assert!(matches_at(100.0, &base, &base));
    assert!(!matches_at(100.0, &base, &near));
}

#[test]
fn test_builtin_providers_round_trip() {
    let dir = tempdir().unwrap();
    let png = dir.path().join("gradient.png");
    RgbImage::from_fn(32, 24, |x, y| Rgb([(x * 8) as u8, (y * 10) as u8, 64]))
        .save(&png)
        .unwrap();
    let bmp = dir.path().join("flat.bmp");
    RgbImage::from_pixel(8, 8, Rgb([200, 10, 10])).save(&bmp).unwrap();
    let text = dir.path().join("notes.txt");
    std::fs::write(&text, "hello").unwrap();
    let samples = vec![png, bmp, text];

    let file_report = validate_provider(&FileProvider::default(), &samples);
    assert!(file_report.is_ok(), "{file_report}");
    assert_eq!(file_report.samples_read, 3);

    let image_report = validate_provider(&ImageProvider::default(), &samples);
    assert!(image_report.is_ok(), "{image_report}");
    assert_eq!(image_report.samples_read, 2);
}

#[test]
fn test_image_stats_read_from_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wide.png");
    RgbImage::from_pixel(40, 10, Rgb([1, 2, 3])).save(&path).unwrap();

    let stats = ImageProvider::default().current_stats(&path).unwrap().unwrap();
    assert_eq!(
        stats[&DIMENSIONS],
        StatValue::Dimensions {
            width: 40,
            height: 10
        }
    );
    assert!(stats.contains_key(&IMG_HASH));
    assert!(ImageProvider::default()
        .current_stats(Path::new("clip.mp4"))
        .unwrap()
        .is_none());
}

struct Sizes;

const CLASHING: &[Stat] = &[Stat::new("BYTES", "size")];

impl StatProvider for Sizes {
    fn name(&self) -> &'static str {
        "sizes"
    }

    fn stats(&self) -> &'static [Stat] {
        CLASHING
    }

    fn read_stats(&self, _path: &Path) -> Result<StatMap, ProviderError> {
        Ok(StatMap::new())
    }

    fn hash(&self, _stat: Stat, value: &StatValue) -> Result<HashKey, ProviderError> {
        Ok(HashKey::Text(value.to_string()))
    }

    fn from_str(&self, _stat: Stat, value: &str) -> Result<StatValue, ProviderError> {
        Ok(StatValue::Text(value.to_string()))
    }

    fn key_to_str(&self, _stat: Stat, key: &HashKey) -> Result<String, ProviderError> {
        Ok(key.to_string())
    }
}

#[test]
fn test_label_collision_rejects_registry() {
    let err = Registry::new(vec![Box::new(FileProvider::default()), Box::new(Sizes)]).unwrap_err();
    match err {
        RegistryError::Collision { ident, first, second } => {
            assert_eq!(ident, "SIZE");
            assert_eq!(first, "file");
            assert_eq!(second, "sizes");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_stat_resolution() {
    let registry = Settings::default().build_registry().unwrap();
    assert_eq!(registry.resolve("size").unwrap(), SIZE);
    assert_eq!(registry.resolve("Image Hash").unwrap(), IMG_HASH);
    assert!(registry.lookup("DURATION").is_none());

    let err = registry.resolve("SIZ").unwrap_err();
    assert!(err.to_string().contains("did you mean 'SIZE'"), "{err}");
}

#[test]
fn test_media_provider_is_optional() {
    let registry = Settings {
        media: true,
        ffprobe: "dupesieve-missing-ffprobe".to_string(),
        ..Settings::default()
    }
    .build_registry()
    .unwrap();
    assert_eq!(registry.resolve("duration").unwrap(), DURATION);
    assert_eq!(
        registry.providers().map(|p| p.name()).collect::<Vec<_>>(),
        vec!["file", "image", "media"]
    );
}
