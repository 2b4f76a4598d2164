use serde_json::json;

use super::*;

fn policy(v: serde_json::Value) -> PagePolicy {
    PagePolicy::from_props(v.as_object().unwrap(), &BookOptions::default())
}

#[test]
fn defaults_follow_book_options() {
    let p = policy(json!({}));
    assert_eq!(p.transition, Transition::Scroll);
    assert_eq!(p.play, PlayMode::Auto);
    assert_eq!(p.fps, 60.0);
    assert_eq!(p.duration, 0.2);
    assert!((p.step() - 1.0 / 12.0).abs() < 1e-12);
    assert!(!p.repeat && !p.rewind && !p.vibrate);
}

#[test]
fn eye_position_needs_a_positive_distance() {
    assert_eq!(policy(json!({"eyePosition": 800})).eye_position, Some(800.0));
    assert_eq!(policy(json!({"eyePosition": 0})).eye_position, None);
    assert_eq!(policy(json!({"eyePosition": "far"})).eye_position, None);
    assert_eq!(policy(json!({})).eye_position, None);
}

#[test]
fn animation_is_an_alias_for_play() {
    assert_eq!(policy(json!({"animation": "never"})).play, PlayMode::Never);
    assert_eq!(
        policy(json!({"play": "always", "animation": "never"})).play,
        PlayMode::Always
    );
}

#[test]
fn non_positive_timing_falls_back() {
    let p = policy(json!({"fps": 0, "duration": -1}));
    assert_eq!((p.fps, p.duration), (60.0, 0.2));
    // Passes shorter than one tick finish on the first tick.
    assert!(policy(json!({"duration": 0.001})).step() > 1.0);
}

#[test]
fn step_allows_fractional_tick_counts() {
    let p = policy(json!({"duration": 0.25, "fps": 30}));
    assert!((p.step() - 1.0 / 7.5).abs() < 1e-12);
    assert!((p.tick_interval() - 1.0 / 30.0).abs() < 1e-12);
}

#[test]
fn autoplay_rules() {
    let auto = policy(json!({}));
    assert!(auto.autoplays(true));
    assert!(!auto.autoplays(false));
    assert!(policy(json!({"play": "always"})).autoplays(false));
    assert!(policy(json!({"play": "never", "repeat": true})).autoplays(false));
    assert!(!policy(json!({"play": "scroll"})).autoplays(true));
    assert_eq!(policy(json!({"transition": "replace"})).transition, Transition::Replace);
}
