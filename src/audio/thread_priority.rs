// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{info, warn};

const PRIORITY_VAR: &str = "PULSEPAD_THREAD_PRIORITY";
const DISABLE_RT_VAR: &str = "PULSEPAD_DISABLE_RT_AUDIO";

/// Priority for the audio callback thread when PULSEPAD_THREAD_PRIORITY is unset.
const DEFAULT_CALLBACK_THREAD_PRIORITY: u8 = 70;

fn parse_priority(value: Option<&str>) -> ThreadPriority {
    value
        .and_then(|v| v.trim().parse::<u8>().ok())
        .filter(|n| *n < 100)
        .and_then(|n| ThreadPriorityValue::try_from(n).ok())
        .or_else(|| ThreadPriorityValue::try_from(DEFAULT_CALLBACK_THREAD_PRIORITY).ok())
        .map(ThreadPriority::Crossplatform)
        .unwrap_or(ThreadPriority::Max)
}

fn parse_flag(value: Option<&str>) -> bool {
    value
        .map(|v| {
            let v = v.trim();
            v == "1"
                || v.eq_ignore_ascii_case("true")
                || v.eq_ignore_ascii_case("yes")
                || v.eq_ignore_ascii_case("on")
        })
        .unwrap_or(false)
}

/// Reads PULSEPAD_THREAD_PRIORITY (0-99) once, before the callback is built.
pub fn callback_thread_priority() -> ThreadPriority {
    parse_priority(std::env::var(PRIORITY_VAR).ok().as_deref())
}

/// Whether to try SCHED_FIFO for the audio callback. Opt out with PULSEPAD_DISABLE_RT_AUDIO=1.
pub fn rt_audio_enabled() -> bool {
    !parse_flag(std::env::var(DISABLE_RT_VAR).ok().as_deref())
}

/// Raises the calling thread's priority the first time it's called.
pub fn configure_audio_thread_priority(
    priority: ThreadPriority,
    rt_audio: bool,
    priority_set: &mut bool,
) {
    if *priority_set {
        return;
    }
    *priority_set = true;

    let _ = set_current_thread_priority(priority);

    #[cfg(unix)]
    if rt_audio {
        use thread_priority::unix::{
            set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
            ThreadSchedulePolicy,
        };
        match set_thread_priority_and_policy(
            thread_native_id(),
            priority,
            ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
        ) {
            Ok(()) => info!("Enabled RT SCHED_FIFO for audio callback thread"),
            Err(e) => warn!(err = %e, "Failed to set RT SCHED_FIFO for audio callback thread"),
        }
    }
    #[cfg(not(unix))]
    let _ = rt_audio;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_priority() {
        let default = ThreadPriority::Crossplatform(
            ThreadPriorityValue::try_from(DEFAULT_CALLBACK_THREAD_PRIORITY).unwrap(),
        );
        assert_eq!(parse_priority(None), default);
        assert_eq!(parse_priority(Some("abc")), default);
        assert_eq!(parse_priority(Some("100")), default);
        assert_eq!(
            parse_priority(Some(" 42 ")),
            ThreadPriority::Crossplatform(ThreadPriorityValue::try_from(42u8).unwrap())
        );
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag(Some("1")));
        assert!(parse_flag(Some("TRUE")));
        assert!(parse_flag(Some("on")));
        assert!(!parse_flag(Some("0")));
        assert!(!parse_flag(None));
    }
}
