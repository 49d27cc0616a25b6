//! Unit tests for core kernel types
//!
//! These run on the host (not the embedded target) to verify the
//! declarative parts of the kernel.

mod error_tests {
    use mos::error::KernelError;

    #[test]
    fn recoverable_classification() {
        assert!(KernelError::PoolExhausted.is_recoverable());
        assert!(KernelError::TooManyTasks.is_recoverable());
        assert!(KernelError::NotFound.is_recoverable());

        assert!(!KernelError::QueueFull.is_recoverable());
        assert!(!KernelError::FrameTooLarge.is_recoverable());
        assert!(!KernelError::BadCaller.is_recoverable());
    }

    #[test]
    fn errors_are_comparable_and_printable() {
        assert_eq!(KernelError::NotFound, KernelError::NotFound);
        assert_ne!(KernelError::NotFound, KernelError::PoolExhausted);
        let _ = format!("{:?}", KernelError::BadCaller);
    }
}

mod types_tests {
    use mos::types::*;

    #[test]
    fn task_state_names() {
        assert_eq!(TaskState::Ready.as_str(), "READY");
        assert_eq!(TaskState::Running.as_str(), "RUNNING");
        assert_eq!(TaskState::Blocked.as_str(), "BLOCKED");
        assert_eq!(TaskState::Terminated.as_str(), "TERMINATED");
    }

    #[test]
    fn tick_comparison_wraps() {
        assert!(tick_reached(5, 5));
        assert!(tick_reached(6, 5));
        assert!(!tick_reached(4, 5));

        // 2 is "after" 0xFFFFFFFE in wrapping order.
        assert!(tick_reached(2, 0xFFFF_FFFE));
        assert!(!tick_reached(0xFFFF_FFFE, 2));
    }
}

mod config_tests {
    use mos::config::*;

    #[test]
    fn config_values() {
        assert!(CFG_MAX_TASK_NUM <= CFG_POOL_SIZE, "every task needs a page");
        assert!(CFG_PAGE_SIZE >= 256, "page too small for a TCB plus stack");

        assert!(CFG_SYSTICK_HZ >= 10);
        assert!(CFG_SYSTICK_HZ <= 10_000);

        assert!(CFG_PRI_MAX < CFG_PRI_MIN);
        assert!(CFG_TIME_SLICE > 0);

        assert!(CFG_ASYNC_SLEEPER_CAP <= CFG_ASYNC_QUEUE_CAP);
        assert_eq!(CFG_ASYNC_LAMBDA_SIZE % 8, 0);
    }
}
