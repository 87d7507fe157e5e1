use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        SlidesError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        SlidesError::configuration("x")
            .to_string()
            .contains("configuration error:")
    );
    assert!(SlidesError::media("x").to_string().contains("media error:"));
    assert!(
        SlidesError::playback("x")
            .to_string()
            .contains("playback error:")
    );
    assert!(
        SlidesError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn missing_file_names_the_path() {
    let err = SlidesError::missing_file("slides/files/Intro/abc.mp4");
    assert!(err.to_string().contains("slides/files/Intro/abc.mp4"));
    assert!(!err.is_usage_error());
}

#[test]
fn loop_errors_are_usage_errors() {
    assert!(SlidesError::NestedLoop.is_usage_error());
    assert!(SlidesError::NoOpenLoop.is_usage_error());
    assert!(!SlidesError::media("boom").is_usage_error());
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = SlidesError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
