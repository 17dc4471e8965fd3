//! Presence update payload construction.

use swicord_common::protocol::{ACTIVITY_TYPE_PLAYING, STATUS_ONLINE};
use swicord_common::{
    Activity, ActivityButton, ActivitySlot, ActivityTimestamps, PresenceConfig, PresenceUpdate,
};

/// Build a presence update from a config snapshot.
///
/// `now_ms` is both `since` and every activity's start timestamp. Slots with
/// an empty name are skipped; the complete buttons are shared by every
/// emitted activity.
pub fn build_presence_update(config: &PresenceConfig, now_ms: i64) -> PresenceUpdate {
    let buttons: Vec<ActivityButton> = config
        .complete_buttons()
        .map(|b| ActivityButton {
            label: b.label.clone(),
            url: b.url.clone(),
        })
        .collect();

    let activities = config
        .activities()
        .into_iter()
        .filter(|slot| slot.is_set())
        .map(|slot| build_activity(slot, &buttons, now_ms))
        .collect();

    PresenceUpdate {
        since: now_ms,
        activities,
        status: STATUS_ONLINE.to_string(),
        afk: false,
    }
}

fn build_activity(slot: &ActivitySlot, buttons: &[ActivityButton], now_ms: i64) -> Activity {
    Activity {
        name: slot.name.clone(),
        kind: ACTIVITY_TYPE_PLAYING,
        timestamps: ActivityTimestamps { start: now_ms },
        details: slot.details().map(str::to_string),
        state: slot.state().map(str::to_string),
        buttons: buttons.to_vec(),
    }
}
