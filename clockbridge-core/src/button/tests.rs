#[cfg(test)]
mod tests {
    use crate::button::*;

    #[test]
    fn test_main_button_press() {
        assert_eq!(classify_transition(0x04, 0x00), Some(BUTTON_PLAY_PAUSE));
        assert_eq!(classify_transition(0x01, 0x00), Some(BUTTON_BACK));
    }

    #[test]
    fn test_main_button_release_is_silent() {
        // Main buttons have no release events.
        assert_eq!(classify_transition(0x00, 0x04), None);
    }

    #[test]
    fn test_no_change_no_event() {
        assert_eq!(classify_transition(0x04, 0x04), None);
        assert_eq!(classify_transition(0x00, 0x00), None);
    }

    #[test]
    fn test_on_off_edges() {
        assert_eq!(classify_transition(0x20, 0x00), Some(EVENT_ON_OFF_PRESS));
        assert_eq!(classify_transition(0x00, 0x20), Some(EVENT_ON_OFF_RELEASE));
    }

    #[test]
    fn test_lever_edges() {
        assert_eq!(classify_transition(0x40, 0x00), Some(EVENT_LEVER_LEFT));
        assert_eq!(classify_transition(0x00, 0x40), Some(EVENT_LEVER_RIGHT));
    }

    #[test]
    fn test_on_off_outranks_lever_and_main() {
        // One frame, one event: the on/off edge wins.
        assert_eq!(classify_transition(0x64, 0x00), Some(EVENT_ON_OFF_PRESS));
        // Without an on/off change the lever wins over the main press.
        assert_eq!(classify_transition(0x44, 0x00), Some(EVENT_LEVER_LEFT));
    }

    #[test]
    fn test_button_names() {
        assert_eq!(button_name(BUTTON_PLAY_PAUSE), "play_pause");
        assert_eq!(button_name(EVENT_LEVER_LEFT), "lever_left");
        assert_eq!(button_name(EVENT_ON_OFF_RELEASE), "on_off_release");
        assert_eq!(button_name(0x03), "unknown");
    }

    #[test]
    fn test_ring_preserves_insertion_order() {
        let mut ring = ButtonRing::new();
        for event in 1..=16u8 {
            ring.push(event);
        }
        assert_eq!(ring.len(), 16);
        for event in 1..=16u8 {
            assert_eq!(ring.pop(), Some(event));
        }
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn test_ring_overwrites_oldest() {
        let mut ring = ButtonRing::new();
        for event in 1..=17u8 {
            ring.push(event);
        }
        // The 17th push dropped event 1; events 2..=17 remain in order.
        assert_eq!(ring.len(), 16);
        for event in 2..=17u8 {
            assert_eq!(ring.pop(), Some(event));
        }
        assert!(ring.is_empty());
    }

    #[test]
    fn test_repeat_after_initial_hold() {
        let mut monitor = RepeatMonitor::new();
        assert_eq!(monitor.poll(0x04, 0), None);
        assert_eq!(monitor.poll(0x04, 500), None);
        // Past the 800 ms threshold the first repeat fires.
        assert_eq!(
            monitor.poll(0x04, 801),
            Some(Repeat {
                mask: 0x04,
                count: 1
            })
        );
        // Subsequent repeats run on the 400 ms cadence.
        assert_eq!(monitor.poll(0x04, 1000), None);
        assert_eq!(
            monitor.poll(0x04, 1202),
            Some(Repeat {
                mask: 0x04,
                count: 2
            })
        );
    }

    #[test]
    fn test_release_stops_repeats() {
        let mut monitor = RepeatMonitor::new();
        monitor.poll(0x04, 0);
        assert!(monitor.poll(0x04, 801).is_some());
        assert_eq!(monitor.poll(0x00, 1200), None);
        // A fresh hold starts over with the long threshold.
        assert_eq!(monitor.poll(0x04, 1300), None);
        assert_eq!(monitor.poll(0x04, 1700), None);
        assert_eq!(
            monitor.poll(0x04, 2101),
            Some(Repeat {
                mask: 0x04,
                count: 1
            })
        );
    }

    #[test]
    fn test_mask_change_resets_hold() {
        let mut monitor = RepeatMonitor::new();
        monitor.poll(0x04, 0);
        // Switching to another button mid-hold must not inherit the timer.
        assert_eq!(monitor.poll(0x08, 900), None);
        assert_eq!(monitor.poll(0x08, 1000), None);
        assert_eq!(
            monitor.poll(0x08, 1801),
            Some(Repeat {
                mask: 0x08,
                count: 1
            })
        );
    }

    #[test]
    fn test_only_main_buttons_repeat() {
        let mut monitor = RepeatMonitor::new();
        assert_eq!(monitor.poll(0x20, 0), None);
        assert_eq!(monitor.poll(0x20, 2000), None);
        assert_eq!(monitor.poll(0x40, 4000), None);
    }
}
