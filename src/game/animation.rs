//! Animation parameter projection

use std::collections::HashMap;
use std::sync::Arc;

use nalgebra::Vector2;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::{Event, EventSet};

/// Named animator parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnimParam {
    Horizontal,
    Vertical,
    IsGrounded,
    CrouchBlend,
    IsCrouching,
}

impl AnimParam {
    pub fn name(self) -> &'static str {
        match self {
            AnimParam::Horizontal => "Horizontal",
            AnimParam::Vertical => "Vertical",
            AnimParam::IsGrounded => "isGrounded",
            AnimParam::CrouchBlend => "CrouchBlend",
            AnimParam::IsCrouching => "isCrouching",
        }
    }
}

pub fn trigger_name(event: Event) -> &'static str {
    match event {
        Event::Jump => "Jump",
        Event::Attack => "Attack",
    }
}

/// Animation playback boundary
pub trait AnimationSink: Send {
    fn set_float(&mut self, param: AnimParam, value: f32);
    fn set_bool(&mut self, param: AnimParam, value: bool);
    fn pulse(&mut self, trigger: Event);
}

/// Values the projector writes for one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationFrame {
    pub blend: Vector2<f32>,
    pub grounded: bool,
    /// Crouch blend and flag, for crouch-capable variants only
    pub crouch: Option<(f32, bool)>,
}

/// Maps simulated or reconciled state onto an [`AnimationSink`]
pub struct AnimationProjector {
    sink: Option<Box<dyn AnimationSink>>,
}

impl AnimationProjector {
    pub fn new(sink: Option<Box<dyn AnimationSink>>) -> Self {
        if sink.is_none() {
            debug!("No animation sink wired, animation writes disabled");
        }
        Self { sink }
    }

    /// Write `frame` and pulse every pending event.
    ///
    /// Pending events are consumed even without a sink so they never replay.
    pub fn project(&mut self, frame: &AnimationFrame, events: &mut EventSet) {
        let pending = events.drain();
        let Some(sink) = self.sink.as_mut() else {
            return;
        };

        sink.set_float(AnimParam::Horizontal, frame.blend.x);
        sink.set_float(AnimParam::Vertical, frame.blend.y);
        sink.set_bool(AnimParam::IsGrounded, frame.grounded);
        if let Some((blend, crouching)) = frame.crouch {
            sink.set_float(AnimParam::CrouchBlend, blend);
            sink.set_bool(AnimParam::IsCrouching, crouching);
        }

        for event in [Event::Jump, Event::Attack] {
            if pending.contains(event) {
                trace!(trigger = trigger_name(event), "Animation trigger");
                sink.pulse(event);
            }
        }
    }
}

#[derive(Debug, Default)]
struct AnimatorLog {
    floats: HashMap<&'static str, f32>,
    bools: HashMap<&'static str, bool>,
    pulses: HashMap<&'static str, u32>,
}

/// Sink that records the latest parameter values and trigger pulse counts,
/// keyed by animator name.
///
/// Clones share the same log, so a test or host can keep a handle while the
/// projector owns the boxed sink.
#[derive(Debug, Clone, Default)]
pub struct AnimatorRecorder {
    log: Arc<Mutex<AnimatorLog>>,
}

impl AnimatorRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn float(&self, param: AnimParam) -> Option<f32> {
        self.log.lock().floats.get(param.name()).copied()
    }

    pub fn flag(&self, param: AnimParam) -> Option<bool> {
        self.log.lock().bools.get(param.name()).copied()
    }

    pub fn pulses(&self, trigger: Event) -> u32 {
        self.log
            .lock()
            .pulses
            .get(trigger_name(trigger))
            .copied()
            .unwrap_or(0)
    }
}

impl AnimationSink for AnimatorRecorder {
    fn set_float(&mut self, param: AnimParam, value: f32) {
        self.log.lock().floats.insert(param.name(), value);
    }

    fn set_bool(&mut self, param: AnimParam, value: bool) {
        self.log.lock().bools.insert(param.name(), value);
    }

    fn pulse(&mut self, trigger: Event) {
        *self.log.lock().pulses.entry(trigger_name(trigger)).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(crouch: Option<(f32, bool)>) -> AnimationFrame {
        AnimationFrame {
            blend: Vector2::new(0.25, -0.5),
            grounded: true,
            crouch,
        }
    }

    #[test]
    fn writes_named_parameters() {
        let recorder = AnimatorRecorder::new();
        let mut projector = AnimationProjector::new(Some(Box::new(recorder.clone())));

        projector.project(&frame(Some((0.4, true))), &mut EventSet::default());

        assert_eq!(recorder.float(AnimParam::Horizontal), Some(0.25));
        assert_eq!(recorder.float(AnimParam::Vertical), Some(-0.5));
        assert_eq!(recorder.flag(AnimParam::IsGrounded), Some(true));
        assert_eq!(recorder.float(AnimParam::CrouchBlend), Some(0.4));
        assert_eq!(recorder.flag(AnimParam::IsCrouching), Some(true));
        assert_eq!(AnimParam::IsGrounded.name(), "isGrounded");
    }

    #[test]
    fn non_crouch_frames_skip_crouch_params() {
        let recorder = AnimatorRecorder::new();
        let mut projector = AnimationProjector::new(Some(Box::new(recorder.clone())));
        projector.project(&frame(None), &mut EventSet::default());
        assert_eq!(recorder.float(AnimParam::CrouchBlend), None);
        assert_eq!(recorder.flag(AnimParam::IsCrouching), None);
    }

    #[test]
    fn events_pulse_exactly_once() {
        let recorder = AnimatorRecorder::new();
        let mut projector = AnimationProjector::new(Some(Box::new(recorder.clone())));
        let mut events = EventSet::default();
        events.raise(Event::Jump);

        projector.project(&frame(None), &mut events);
        projector.project(&frame(None), &mut events);

        assert_eq!(recorder.pulses(Event::Jump), 1);
        assert_eq!(recorder.pulses(Event::Attack), 0);
        assert_eq!(trigger_name(Event::Jump), "Jump");
    }

    #[test]
    fn missing_sink_still_consumes_events() {
        let mut projector = AnimationProjector::new(None);
        let mut events = EventSet::default();
        events.raise(Event::Attack);
        projector.project(&frame(None), &mut events);
        assert!(events.is_empty());
    }
}
