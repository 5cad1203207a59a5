use chrono::DateTime;
use serde_json::json;
use uuid::Uuid;

use super::*;

fn sample_track() -> Track {
    Track {
        id: Uuid::parse_str("a1b2c3d4-0000-4000-8000-000000000001").unwrap(),
        ext: FileType::Mp3,
        playlist: "music".to_string(),
        original_filename: "song.mp3".to_string(),
        import_timestamp: DateTime::parse_from_rfc3339("2024-05-01T12:00:00+02:00").unwrap(),
        weight: 2,
        artist: "Artist".to_string(),
        title: "Title".to_string(),
        track_gain: -3.5,
        cue_in: 0.5,
        cue_out: 180.0,
        play_count: 7,
        last_play: None,
        channels: 2,
        samplerate: 44100,
        bitrate: 192,
        uploader: String::new(),
        expiration: None,
    }
}

#[test]
fn file_type_parses_extensions_case_insensitive() {
    assert_eq!(FileType::from_ext("MP3"), Some(FileType::Mp3));
    assert_eq!(FileType::from_ext("flac"), Some(FileType::Flac));
    assert_eq!(FileType::from_ext("aiff"), None);
    assert!("ogg".parse::<FileType>().is_ok());
    assert!("txt".parse::<FileType>().is_err());
}

#[test]
fn relative_path_joins_playlist_id_and_ext() {
    let t = sample_track();
    assert_eq!(
        t.relative_path(),
        "music/a1b2c3d4-0000-4000-8000-000000000001.mp3"
    );
    assert_eq!(t.file_name(), "a1b2c3d4-0000-4000-8000-000000000001.mp3");
}

#[test]
fn track_serializes_absent_instants_as_empty_strings() {
    let t = sample_track();
    let v = serde_json::to_value(&t).unwrap();
    assert_eq!(v["last_play"], json!(""));
    assert_eq!(v["expiration"], json!(""));
    assert_eq!(v["ext"], json!("mp3"));
    assert_eq!(v["import_timestamp"], json!("2024-05-01T12:00:00+02:00"));

    let back: Track = serde_json::from_value(v).unwrap();
    assert_eq!(back, t);
}

#[test]
fn track_round_trips_through_value_map() {
    let mut t = sample_track();
    t.last_play = Some(DateTime::parse_from_rfc3339("2024-06-01T00:00:00+00:00").unwrap());
    let map = t.to_value_map();
    let back = Track::from_value_map(map).unwrap();
    assert_eq!(back, t);
}

#[test]
fn from_value_map_rejects_incomplete_records() {
    let mut map = sample_track().to_value_map();
    map.remove("weight");
    assert!(Track::from_value_map(map).is_err());
}

#[test]
fn get_returns_single_field_values() {
    let t = sample_track();
    assert_eq!(t.get(Field::Weight), json!(2));
    assert_eq!(t.get(Field::Playlist), json!("music"));
    assert_eq!(t.get(Field::LastPlay), json!(""));
}

#[test]
fn update_allow_list_is_artist_title_weight_expiration() {
    let allowed: Vec<Field> = Field::ALL.iter().copied().filter(Field::updatable).collect();
    assert_eq!(
        allowed,
        vec![Field::Weight, Field::Artist, Field::Title, Field::Expiration]
    );
}

#[test]
fn weight_validation_requires_non_negative_integer() {
    assert!(Field::Weight.validate(&json!(0)).is_ok());
    assert!(Field::Weight.validate(&json!(4)).is_ok());
    assert!(Field::Weight.validate(&json!(u32::MAX)).is_ok());
    assert!(Field::Weight.validate(&json!(u64::from(u32::MAX) + 1)).is_err());
    assert!(Field::Weight.validate(&json!(-1)).is_err());
    assert!(Field::Weight.validate(&json!(1.5)).is_err());
    assert!(Field::Weight.validate(&json!("3")).is_err());
}

#[test]
fn timestamp_validation_requires_timezone_aware_instants() {
    assert!(Field::Expiration.validate(&json!("")).is_ok());
    assert!(Field::Expiration
        .validate(&json!("2024-06-01T00:00:00+02:00"))
        .is_ok());
    // Missing timezone offset.
    assert!(Field::Expiration
        .validate(&json!("2024-06-01T00:00:00"))
        .is_err());
    assert!(Field::ImportTimestamp.validate(&json!("")).is_err());
}

#[test]
fn channel_and_samplerate_validation() {
    assert!(Field::Channels.validate(&json!(1)).is_ok());
    assert!(Field::Channels.validate(&json!(2)).is_ok());
    assert!(Field::Channels.validate(&json!(6)).is_err());
    assert!(Field::Samplerate.validate(&json!(44100)).is_ok());
    assert!(Field::Samplerate.validate(&json!(0)).is_err());
}

#[test]
fn id_validation_requires_uuid() {
    assert!(Field::Id
        .validate(&json!("a1b2c3d4-0000-4000-8000-000000000001"))
        .is_ok());
    assert!(Field::Id.validate(&json!("not-a-uuid")).is_err());
}

#[test]
fn log_fields_match_the_csv_column_order() {
    let names: Vec<&str> = LOG_FIELDS.iter().map(Field::as_str).collect();
    assert_eq!(
        names,
        vec![
            "id",
            "playlist",
            "original_filename",
            "artist",
            "title",
            "play_count",
            "last_play"
        ]
    );
}

#[test]
fn every_field_round_trips_through_its_name() {
    for f in Field::ALL {
        let parsed: Field = f.as_str().parse().unwrap();
        assert_eq!(parsed, f);
    }
    assert!("bogus".parse::<Field>().is_err());
}
