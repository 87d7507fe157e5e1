use super::*;
use crate::slides::model::SlideKind;

fn assert_covers(descs: &[SlideDescriptor], total: usize) {
    assert!(!descs.is_empty());
    assert_eq!(descs[0].start_animation, 0);
    for pair in descs.windows(2) {
        assert_eq!(pair[0].end_animation, pair[1].start_animation);
    }
    assert_eq!(descs.last().unwrap().end_animation, total);
    let lasts = descs.iter().filter(|d| d.kind == SlideKind::Last).count();
    assert_eq!(lasts, 1);
    assert_eq!(descs.last().unwrap().kind, SlideKind::Last);
    for (i, d) in descs.iter().enumerate() {
        assert_eq!(d.number, i + 1);
    }
}

#[test]
fn three_plays_with_one_boundary() {
    let mut rec = Recorder::new();
    rec.play();
    rec.play();
    rec.next_slide(BaseSlideConfig::default()).unwrap();
    rec.play();
    let descs = rec.finalize().unwrap();

    assert_eq!(descs.len(), 2);
    assert_eq!((descs[0].kind, descs[0].range()), (SlideKind::Slide, 0..2));
    assert_eq!((descs[1].kind, descs[1].range()), (SlideKind::Last, 2..3));
    assert_covers(&descs, 3);
}

#[test]
fn empty_spans_are_elided() {
    let mut rec = Recorder::new();
    rec.next_slide(BaseSlideConfig::default()).unwrap();
    rec.play();
    rec.next_slide(BaseSlideConfig::default()).unwrap();
    rec.next_slide(BaseSlideConfig::default()).unwrap();
    rec.play();
    let descs = rec.finalize().unwrap();

    assert_eq!(descs.len(), 2);
    assert_covers(&descs, 2);
}

#[test]
fn config_applies_to_the_following_span() {
    let mut rec = Recorder::new();
    rec.play();
    rec.next_slide(BaseSlideConfig {
        looping: true,
        notes: "spin".to_owned(),
        ..BaseSlideConfig::default()
    })
    .unwrap();
    rec.play();
    rec.next_slide(BaseSlideConfig::default()).unwrap();
    rec.play();
    let descs = rec.finalize().unwrap();

    assert!(!descs[0].config.looping);
    assert!(descs[1].config.looping);
    assert_eq!(descs[1].kind, SlideKind::Slide);
    assert!(descs[1].is_loop());
    assert_eq!(descs[1].config.notes, "spin");
    assert!(!descs[2].config.looping);
}

#[test]
fn trailing_boundary_promotes_previous_descriptor() {
    let mut rec = Recorder::new();
    rec.play();
    rec.play();
    rec.next_slide(BaseSlideConfig::default()).unwrap();
    let descs = rec.finalize().unwrap();

    assert_eq!(descs.len(), 1);
    assert_eq!(descs[0].kind, SlideKind::Last);
    assert_covers(&descs, 2);
}

#[test]
fn loops_close_surrounding_spans() {
    let mut rec = Recorder::new();
    rec.play();
    rec.start_loop().unwrap();
    rec.play();
    rec.play();
    rec.end_loop().unwrap();
    rec.play();
    let descs = rec.finalize().unwrap();

    assert_eq!(descs.len(), 3);
    assert_eq!(descs[0].kind, SlideKind::Slide);
    assert_eq!((descs[1].kind, descs[1].range()), (SlideKind::Loop, 1..3));
    assert_covers(&descs, 4);
}

#[test]
fn trailing_loop_is_promoted_and_keeps_loop_flag() {
    let mut rec = Recorder::new();
    rec.start_loop().unwrap();
    rec.play();
    rec.end_loop().unwrap();
    let descs = rec.finalize().unwrap();

    assert_eq!(descs.len(), 1);
    assert_eq!(descs[0].kind, SlideKind::Last);
    assert!(descs[0].config.looping);
}

#[test]
fn loop_state_machine_errors() {
    let mut rec = Recorder::new();
    assert!(matches!(rec.end_loop(), Err(SlidesError::NoOpenLoop)));

    rec.start_loop().unwrap();
    assert!(matches!(rec.start_loop(), Err(SlidesError::NestedLoop)));
    assert!(matches!(
        rec.next_slide(BaseSlideConfig::default()),
        Err(SlidesError::Configuration(_))
    ));
    assert!(rec.is_loop_open());
}

#[test]
fn zero_length_loop_is_rejected() {
    let mut rec = Recorder::new();
    rec.play();
    rec.start_loop().unwrap();
    let err = rec.end_loop().unwrap_err();
    assert!(matches!(err, SlidesError::Validation(_)));
    assert!(rec.is_loop_open());
}

#[test]
fn unclosed_loop_fails_finalize() {
    let mut rec = Recorder::new();
    rec.play();
    rec.start_loop().unwrap();
    rec.play();
    assert!(matches!(
        rec.finalize(),
        Err(SlidesError::Configuration(_))
    ));
}

#[test]
fn empty_scene_is_rejected() {
    let err = Recorder::new().finalize().unwrap_err();
    assert!(err.to_string().contains("at least one animation"));
}

#[test]
fn invalid_rate_is_rejected_at_boundary() {
    let mut rec = Recorder::new();
    rec.play();
    let err = rec
        .next_slide(BaseSlideConfig {
            playback_rate: -1.0,
            ..BaseSlideConfig::default()
        })
        .unwrap_err();
    assert!(matches!(err, SlidesError::Validation(_)));
}

#[test]
fn replay_matches_manual_calls() {
    let events = vec![
        SceneEvent::Play { count: 2 },
        SceneEvent::NextSlide(BaseSlideConfig::default()),
        SceneEvent::StartLoop,
        SceneEvent::Play { count: 1 },
        SceneEvent::EndLoop,
        SceneEvent::Play { count: 3 },
    ];
    let descs = Recorder::replay(&events).unwrap();
    assert_eq!(descs.len(), 3);
    assert_eq!(descs[1].kind, SlideKind::Loop);
    assert_covers(&descs, 6);
}

#[test]
fn coverage_holds_for_generated_scripts() {
    // Small deterministic generator over (plays, boundary) choices.
    let mut seed: u64 = 0x9e37_79b9_7f4a_7c15;
    for _ in 0..200 {
        let mut rec = Recorder::new();
        let mut in_loop = false;
        let mut loop_len = 0;
        for _ in 0..12 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            match seed % 5 {
                0 | 1 => {
                    rec.play();
                    loop_len += 1;
                }
                2 if !in_loop => rec.next_slide(BaseSlideConfig::default()).unwrap(),
                3 if !in_loop => {
                    rec.start_loop().unwrap();
                    in_loop = true;
                    loop_len = 0;
                }
                4 if in_loop && loop_len > 0 => {
                    rec.end_loop().unwrap();
                    in_loop = false;
                }
                _ => {}
            }
        }
        if in_loop {
            rec.play();
            rec.end_loop().unwrap();
        }
        rec.play();
        let total = rec.current_animation();
        let descs = rec.finalize().unwrap();
        assert_covers(&descs, total);
    }
}
