use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Subscription;

/// One VEVENT parsed from a freshly fetched feed.
///
/// Exception/override instances (VEVENTs sharing the UID but carrying a
/// RECURRENCE-ID) are attached to their master event as `exceptions`; their
/// own `exceptions` lists stay empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEvent {
    pub uid: String,
    /// RECURRENCE-ID raw value; `None` for the master event.
    pub recurrence_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub all_day: bool,
    pub rrule: Option<String>,
    /// Reminder offsets in minutes before the event start.
    pub reminders: Vec<i64>,
    /// LAST-MODIFIED in epoch milliseconds, if the feed provided one.
    pub last_modified: Option<i64>,
    pub exceptions: Vec<RemoteEvent>,
}

impl RemoteEvent {
    pub fn new<U: Into<String>>(uid: U) -> Self {
        Self {
            uid: uid.into(),
            recurrence_id: None,
            summary: None,
            description: None,
            location: None,
            start: None,
            end: None,
            all_day: false,
            rrule: None,
            reminders: Vec::new(),
            last_modified: None,
            exceptions: Vec::new(),
        }
    }

    /// Adjusts the event according to the subscription's alarm and
    /// description settings. Applies to the event and all its exceptions.
    pub fn apply_preferences(&mut self, subscription: &Subscription) {
        if subscription.ignore_embedded_alerts {
            log::debug!("Removing all alarms from {}", self.uid);
            self.reminders.clear();
            for exception in &mut self.exceptions {
                exception.reminders.clear();
            }
        }

        let alarm_minutes = if self.all_day {
            subscription.default_all_day_alarm_minutes
        } else {
            subscription.default_alarm_minutes
        };
        if let Some(minutes) = alarm_minutes {
            log::debug!("Adding the default alarm to {}", self.uid);
            self.reminders.push(minutes);
            for exception in &mut self.exceptions {
                exception.reminders.push(minutes);
            }
        }

        if subscription.ignore_description {
            log::debug!("Removing the description from {}", self.uid);
            self.description = None;
            for exception in &mut self.exceptions {
                exception.description = None;
            }
        }
    }
}

/// Calendar-level properties extracted from a feed (NAME/COLOR or their
/// vendor extensions).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalendarMetadata {
    pub name: Option<String>,
    pub color: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscription() -> Subscription {
        Subscription::new("https://example.com/feed.ics", "Test")
    }

    fn event_with_reminders() -> RemoteEvent {
        let mut event = RemoteEvent::new("uid1");
        event.reminders = vec![10];
        event.description = Some("details".to_string());
        let mut exception = RemoteEvent::new("uid1");
        exception.recurrence_id = Some("20240102T100000Z".to_string());
        exception.reminders = vec![10];
        exception.description = Some("changed details".to_string());
        event.exceptions.push(exception);
        event
    }

    #[test]
    fn test_ignore_embedded_alerts_clears_exceptions_too() {
        let mut sub = subscription();
        sub.ignore_embedded_alerts = true;

        let mut event = event_with_reminders();
        event.apply_preferences(&sub);

        assert!(event.reminders.is_empty());
        assert!(event.exceptions[0].reminders.is_empty());
    }

    #[test]
    fn test_default_alarm_appended() {
        let mut sub = subscription();
        sub.default_alarm_minutes = Some(15);

        let mut event = event_with_reminders();
        event.apply_preferences(&sub);

        assert_eq!(event.reminders, vec![10, 15]);
        assert_eq!(event.exceptions[0].reminders, vec![10, 15]);
    }

    #[test]
    fn test_all_day_event_uses_all_day_alarm() {
        let mut sub = subscription();
        sub.default_alarm_minutes = Some(15);
        sub.default_all_day_alarm_minutes = Some(600);

        let mut event = event_with_reminders();
        event.all_day = true;
        event.apply_preferences(&sub);

        assert_eq!(event.reminders, vec![10, 600]);
    }

    #[test]
    fn test_all_day_event_without_all_day_alarm_gets_none() {
        let mut sub = subscription();
        sub.default_alarm_minutes = Some(15);

        let mut event = event_with_reminders();
        event.all_day = true;
        event.apply_preferences(&sub);

        assert_eq!(event.reminders, vec![10]);
    }

    #[test]
    fn test_ignore_description() {
        let mut sub = subscription();
        sub.ignore_description = true;

        let mut event = event_with_reminders();
        event.apply_preferences(&sub);

        assert!(event.description.is_none());
        assert!(event.exceptions[0].description.is_none());
    }
}
