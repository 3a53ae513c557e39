//! Core aggregate and domain event traits.

use serde::Serialize;

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense.
pub trait DomainEvent: Serialize + Send + Sync + Clone {
    /// Returns the event type name.
    ///
    /// Used as a log field and metrics label.
    fn event_type(&self) -> &'static str;
}

/// Trait for aggregates whose state changes only through events.
///
/// Command methods inspect the current state and either reject the request
/// or return the events describing the change. Applying those events is the
/// only way state is mutated:
/// - Given the same state and event, `apply` always produces the same new state
/// - `apply` has no side effects
/// - `apply` never fails (events represent facts that have happened)
pub trait Aggregate: Default + Send + Sync + Sized {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// Returns the aggregate type name.
    fn aggregate_type() -> &'static str;

    /// Applies an event to the aggregate, updating its state.
    fn apply(&mut self, event: Self::Event);

    /// Applies multiple events in sequence.
    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Debug, Clone, Serialize)]
    enum TestEvent {
        Created,
        Updated { value: i32 },
    }

    impl DomainEvent for TestEvent {
        fn event_type(&self) -> &'static str {
            match self {
                TestEvent::Created => "TestCreated",
                TestEvent::Updated { .. } => "TestUpdated",
            }
        }
    }

    #[derive(Debug, Default)]
    struct TestAggregate {
        created: bool,
        value: i32,
    }

    impl Aggregate for TestAggregate {
        type Event = TestEvent;

        fn aggregate_type() -> &'static str {
            "TestAggregate"
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                TestEvent::Created => self.created = true,
                TestEvent::Updated { value } => self.value = value,
            }
        }
    }

    #[test]
    fn test_aggregate_apply_events() {
        let mut aggregate = TestAggregate::default();
        aggregate.apply_events(vec![TestEvent::Created, TestEvent::Updated { value: 42 }]);

        assert!(aggregate.created);
        assert_eq!(aggregate.value, 42);
        assert_eq!(TestAggregate::aggregate_type(), "TestAggregate");
    }

    #[test]
    fn test_domain_event_type() {
        assert_eq!(TestEvent::Created.event_type(), "TestCreated");
        assert_eq!(TestEvent::Updated { value: 1 }.event_type(), "TestUpdated");
    }
}
