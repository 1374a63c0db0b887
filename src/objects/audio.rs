use crate::assets::AudioClip;
use crate::cache::Cached;
use crate::signal::Signal;
use anyhow::{anyhow, Result};
use log::debug;
use std::rc::Rc;
use wasm_bindgen::prelude::Closure;
use wasm_bindgen::JsCast;
use web_sys::{AudioBufferSourceNode, AudioContext, GainNode};

/// A cached clip played through `source -> gain -> destination`.
///
/// Every [`Audio::play`] builds a fresh buffer source, the gain node follows
/// [`Audio::volume`] on each update.
pub struct Audio {
    clip: Option<Cached<AudioClip>>,
    context: Option<AudioContext>,
    source: Option<AudioBufferSourceNode>,
    gain: Option<GainNode>,
    on_ended: Option<Closure<dyn FnMut()>>,
    is_loop: bool,
    pub volume: f64,
    on_complete: Rc<Signal<()>>,
}

impl Audio {
    /// A zero or NaN `volume` plays at full volume.
    pub fn new(clip: Option<Cached<AudioClip>>, context: Option<AudioContext>, volume: f64) -> Self {
        let volume = if volume == 0.0 || volume.is_nan() { 1.0 } else { volume };
        Audio {
            clip,
            context,
            source: None,
            gain: None,
            on_ended: None,
            is_loop: false,
            volume,
            on_complete: Rc::new(Signal::new()),
        }
    }

    pub fn on_complete(&self) -> Rc<Signal<()>> {
        self.on_complete.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.source.is_some()
    }

    /// Starts the clip `when` seconds into the context's timeline.
    ///
    /// # Returns
    /// * `Err` - no audio context, clip not cached or not decoded yet, or the
    ///   audio graph refused the connection
    pub fn play(&mut self, when: f64) -> Result<()> {
        let context = self
            .context
            .as_ref()
            .ok_or_else(|| anyhow!("Audio: no audio context"))?;
        let clip = self
            .clip
            .as_ref()
            .ok_or_else(|| anyhow!("Audio: clip is not cached"))?;
        let buffer = clip
            .borrow()
            .payload()
            .and_then(|clip| clip.buffer.clone())
            .ok_or_else(|| anyhow!("Audio: clip '{}' is not decoded", clip.borrow().name()))?;

        let source = context
            .create_buffer_source()
            .map_err(|err| anyhow!("Could not create buffer source : {:#?}", err))?;
        let gain = context
            .create_gain()
            .map_err(|err| anyhow!("Could not create gain node : {:#?}", err))?;
        source.set_buffer(Some(&buffer));
        source
            .connect_with_audio_node(&gain)
            .map_err(|err| anyhow!("Could not connect source : {:#?}", err))?;
        gain.connect_with_audio_node(&context.destination())
            .map_err(|err| anyhow!("Could not connect gain : {:#?}", err))?;
        gain.gain().set_value(self.volume as f32);
        source.set_loop(self.is_loop);

        let on_complete = self.on_complete.clone();
        let on_ended = Closure::wrap(Box::new(move || on_complete.dispatch(&())) as Box<dyn FnMut()>);
        source.set_onended(Some(on_ended.as_ref().unchecked_ref()));
        source
            .start_with_when(when)
            .map_err(|err| anyhow!("Could not start audio : {:#?}", err))?;

        self.stop(0.0);
        self.source = Some(source);
        self.gain = Some(gain);
        self.on_ended = Some(on_ended);
        Ok(())
    }

    pub fn stop(&mut self, when: f64) {
        if let Some(source) = self.source.take() {
            source.set_onended(None);
            if let Err(err) = source.stop_with_when(when) {
                debug!("Audio: stop ignored : {:#?}", err);
            }
        }
        self.gain = None;
        self.on_ended = None;
    }

    /// Applies to the next [`Audio::play`].
    pub fn set_loop(&mut self, looping: bool) {
        self.is_loop = looping;
    }

    pub fn is_looping(&self) -> bool {
        self.is_loop
    }

    pub(crate) fn update(&mut self) {
        if let Some(gain) = &self.gain {
            gain.gain().set_value(self.volume as f32);
        }
    }

    pub(crate) fn release(&mut self) {
        self.stop(0.0);
        self.on_complete.clear();
    }
}
