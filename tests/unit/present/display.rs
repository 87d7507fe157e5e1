use super::*;

fn info(slide_index: usize, state: State) -> DisplayInfo {
    DisplayInfo {
        scene_name: "Intro".to_owned(),
        scene_index: 0,
        scene_count: 1,
        slide_index,
        slide_count: 3,
        slide_number: slide_index + 1,
        kind: SlideKind::Slide,
        state,
        direction: Direction::Forward,
        notes: String::new(),
        fps: 30.0,
    }
}

#[test]
fn in_memory_display_clones_share_one_log() {
    let display = InMemoryDisplay::new();
    let mut sink: Box<dyn DisplaySink> = Box::new(display.clone());

    sink.show(None, &info(0, State::Playing)).unwrap();
    let frame = FrameRGBA {
        width: 1,
        height: 1,
        data: vec![1, 2, 3, 255],
    };
    sink.show(Some(&frame), &info(1, State::Wait)).unwrap();
    sink.toggle_full_screen();
    sink.toggle_mouse();
    sink.toggle_mouse();
    sink.finish().unwrap();

    let log = display.log();
    assert_eq!(log.frames, vec![None, Some(frame)]);
    assert_eq!(log.infos.len(), 2);
    assert_eq!(log.infos[1].state, State::Wait);
    assert!(log.full_screen);
    assert!(!log.mouse_hidden);
    assert!(log.finished);
}

#[test]
fn null_display_only_tracks_changes() {
    let mut display = NullDisplay::new();
    display.show(None, &info(0, State::Playing)).unwrap();
    assert_eq!(display.last, Some((0, 0, State::Playing, Direction::Forward)));
    display.show(None, &info(0, State::Playing)).unwrap();
    display.show(None, &info(2, State::Paused)).unwrap();
    assert_eq!(display.last, Some((0, 2, State::Paused, Direction::Forward)));
    assert!(display.finish().is_ok());
}
