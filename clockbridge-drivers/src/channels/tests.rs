#[cfg(test)]
mod tests {
    use clockbridge_core::protocol::{
        ClockEvent, EventData, EventKind, PRIORITY_HIGH, PRIORITY_NORMAL,
    };
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_sync::priority_channel::{Min, PriorityChannel};

    fn event(priority: u8, seq: u32) -> ClockEvent {
        ClockEvent {
            kind: EventKind::ConnectionStatus,
            timestamp: 0,
            priority,
            seq,
            data: EventData::Connection {
                connected: false,
                configured: false,
            },
        }
    }

    #[test]
    fn test_priority_event_jumps_queued_normals() {
        let queue: PriorityChannel<CriticalSectionRawMutex, ClockEvent, Min, 8> =
            PriorityChannel::new();
        queue.try_send(event(PRIORITY_NORMAL, 0)).unwrap();
        queue.try_send(event(PRIORITY_NORMAL, 1)).unwrap();
        queue.try_send(event(PRIORITY_HIGH, 2)).unwrap();

        assert_eq!(queue.try_receive().unwrap().seq, 2);
        assert_eq!(queue.try_receive().unwrap().seq, 0);
        assert_eq!(queue.try_receive().unwrap().seq, 1);
        assert!(queue.try_receive().is_err());
    }

    #[test]
    fn test_priority_class_keeps_insertion_order() {
        let queue: PriorityChannel<CriticalSectionRawMutex, ClockEvent, Min, 8> =
            PriorityChannel::new();
        for seq in 0..4 {
            queue.try_send(event(PRIORITY_HIGH, seq)).unwrap();
        }
        for seq in 0..4 {
            assert_eq!(queue.try_receive().unwrap().seq, seq);
        }
    }

    #[test]
    fn test_full_queue_rejects_and_drops() {
        let queue: PriorityChannel<CriticalSectionRawMutex, ClockEvent, Min, 2> =
            PriorityChannel::new();
        assert!(queue.try_send(event(PRIORITY_NORMAL, 0)).is_ok());
        assert!(queue.try_send(event(PRIORITY_NORMAL, 1)).is_ok());
        // The third send fails and its event is destroyed with the error.
        assert!(queue.try_send(event(PRIORITY_NORMAL, 2)).is_err());

        // Exactly the two accepted events come back out.
        assert_eq!(queue.try_receive().unwrap().seq, 0);
        assert_eq!(queue.try_receive().unwrap().seq, 1);
        assert!(queue.try_receive().is_err());
    }

    #[test]
    fn test_mixed_priorities_total_order() {
        let queue: PriorityChannel<CriticalSectionRawMutex, ClockEvent, Min, 8> =
            PriorityChannel::new();
        queue.try_send(event(PRIORITY_NORMAL, 0)).unwrap();
        queue.try_send(event(PRIORITY_HIGH, 1)).unwrap();
        queue.try_send(event(PRIORITY_NORMAL, 2)).unwrap();
        queue.try_send(event(PRIORITY_HIGH, 3)).unwrap();

        let drained: [u32; 4] = core::array::from_fn(|_| queue.try_receive().unwrap().seq);
        assert_eq!(drained, [1, 3, 0, 2]);
    }

    #[test]
    fn test_utilization_threshold() {
        use crate::channels::below_threshold;
        // 8 of 10 hits the 80% threshold; 7 stays under it.
        assert!(!below_threshold(8, 10));
        assert!(below_threshold(7, 10));
        assert!(!below_threshold(16, 20));
        assert!(below_threshold(15, 20));
    }
}
