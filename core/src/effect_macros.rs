//! Declarative macros for ergonomic effect construction
//!
//! These macros reduce boilerplate when reducers return `Effect::Future`
//! and `Effect::Delay` values.

/// Create an `Effect::Future` from an async block
///
/// # Example
///
/// ```rust,ignore
/// use gatecheck_core::async_effect;
///
/// async_effect! {
///     let reading = sensor.read().await;
///     Some(TimerAction::Measured { reading })
/// }
/// ```
#[macro_export]
macro_rules! async_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Future(
            ::std::boxed::Box::pin(async move { $($body)* })
        )
    };
}

/// Create an `Effect::Delay` for scheduling delayed actions
///
/// # Example
///
/// ```rust,ignore
/// use gatecheck_core::delay;
/// use std::time::Duration;
///
/// delay! {
///     duration: Duration::from_secs(3),
///     action: TimerAction::Expired { id }
/// }
/// ```
#[macro_export]
macro_rules! delay {
    (
        duration: $duration:expr,
        action: $action:expr
    ) => {
        $crate::effect::Effect::Delay {
            duration: $duration,
            action: ::std::boxed::Box::new($action),
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::effect::Effect;
    use std::time::Duration;

    #[derive(Clone, Debug, PartialEq)]
    enum TestAction {
        Completed { value: i32 },
        CooldownElapsed,
    }

    #[tokio::test]
    async fn async_effect_wraps_the_block() {
        let effect = async_effect! {
            Some(TestAction::Completed { value: 42 })
        };

        let Effect::Future(fut) = effect else {
            unreachable!("async_effect! always builds Effect::Future");
        };
        assert_eq!(fut.await, Some(TestAction::Completed { value: 42 }));
    }

    #[test]
    fn delay_macro_builds_delay() {
        let effect = delay! {
            duration: Duration::from_secs(3),
            action: TestAction::CooldownElapsed
        };

        assert!(matches!(
            effect,
            Effect::Delay { duration, ref action }
                if duration == Duration::from_secs(3) && **action == TestAction::CooldownElapsed
        ));
    }
}
