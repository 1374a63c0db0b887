use crate::engine::Size;
use crate::input::InputEvent;
use anyhow::{anyhow, Result};
use futures::channel::mpsc::UnboundedSender;
use futures::future::LocalFutureObj;
use futures::task::{LocalSpawn, SpawnError};
use js_sys::ArrayBuffer;
use log::{Level, LevelFilter, Log, Metadata, Record};
use serde::de::DeserializeOwned;
use std::future::Future;
use wasm_bindgen::closure::{Closure, WasmClosure, WasmClosureFnOnce};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

#[rustfmt::skip]
use web_sys::{
    CanvasRenderingContext2d,
    Document,
    Event,
    EventTarget,
    HtmlCanvasElement,
    HtmlImageElement,
    KeyboardEvent,
    MouseEvent,
    Response,
    TouchEvent,
    Window,
};

// ==================== Constants ====================
// Constants related to HTML elements
mod html {
    pub const CONTEXT_2D: &str = "2d";
    pub const CANVAS: &str = "canvas";
}

// user agents treated as touch devices
const MOBILE_AGENTS: [&str; 8] = [
    "android",
    "webos",
    "iphone",
    "ipad",
    "ipod",
    "blackberry",
    "iemobile",
    "opera mini",
];

pub fn window() -> Result<Window> {
    web_sys::window().ok_or_else(|| anyhow!("Window not found"))
}

pub fn document() -> Result<Document> {
    window()?
        .document()
        .ok_or_else(|| anyhow!("No Document Found"))
}

pub fn canvas(id: &str) -> Result<HtmlCanvasElement> {
    document()?
        .get_element_by_id(id)
        .ok_or_else(|| anyhow!("No Canvas Element found with ID : '{}'", id))?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|element| anyhow!("Error converting {:#?} to HtmlCanvasElement", element))
}

pub fn context_2d(canvas: &HtmlCanvasElement) -> Result<CanvasRenderingContext2d> {
    canvas
        .get_context(html::CONTEXT_2D)
        // Result<Option<Object>, JsValue> : error first, then the missing context
        .map_err(|js_value| anyhow!("Error getting context : {:#?}", js_value))?
        .ok_or_else(|| anyhow!("No 2d context found"))?
        .dyn_into::<CanvasRenderingContext2d>()
        .map_err(|element| {
            anyhow!(
                "Error converting {:#?} to CanvasRenderingContext2d",
                element
            )
        })
}

pub fn new_image() -> Result<HtmlImageElement> {
    HtmlImageElement::new()
        .map_err(|err| anyhow!("Could not create image element : {:#?}", err))
}

/// Inner size of the browser window.
pub fn window_size() -> Result<Size> {
    let window = window()?;
    let read = |value: std::result::Result<JsValue, JsValue>, axis: &str| {
        value
            .ok()
            .and_then(|value| value.as_f64())
            .ok_or_else(|| anyhow!("No inner {} on window", axis))
    };
    Ok(Size::new(
        read(window.inner_width(), "width")?,
        read(window.inner_height(), "height")?,
    ))
}

pub fn is_mobile() -> bool {
    window()
        .and_then(|window| {
            window
                .navigator()
                .user_agent()
                .map_err(|err| anyhow!("No user agent : {:#?}", err))
        })
        .map(|agent| {
            let agent = agent.to_lowercase();
            MOBILE_AGENTS.iter().any(|mobile| agent.contains(mobile))
        })
        .unwrap_or(false)
}

// ==================== Closures and frames ====================

pub fn closure_once<F, A, R>(f: F) -> Closure<F::FnMut>
where
    F: 'static + WasmClosureFnOnce<A, R>,
{
    Closure::once(f)
}

pub fn closure_wrap<T: WasmClosure + ?Sized>(data: Box<T>) -> Closure<T> {
    Closure::wrap(data)
}

pub type LoopClosure = Closure<dyn FnMut(f64)>;

pub fn create_raf_closure(f: impl FnMut(f64) + 'static) -> LoopClosure {
    closure_wrap(Box::new(f))
}

pub fn request_animation_frame(callback: &LoopClosure) -> Result<i32> {
    window()?
        .request_animation_frame(callback.as_ref().unchecked_ref())
        .map_err(|err| anyhow!("Cannot request animation frame {:#?}", err))
}

/// `performance.now()` in milliseconds.
pub fn now() -> Result<f64> {
    Ok(window()?
        .performance()
        .ok_or_else(|| anyhow!("Performance object not found"))?
        .now())
}

// ==================== Tasks ====================

pub fn spawn_local<F>(future: F)
where
    F: Future<Output = ()> + 'static,
{
    wasm_bindgen_futures::spawn_local(future);
}

/// Runs loader tasks on the browser's microtask queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserSpawner;

impl LocalSpawn for BrowserSpawner {
    fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
        spawn_local(future);
        Ok(())
    }
}

// ==================== Fetch ====================

/// Fetches `resource` and rejects anything outside 2xx.
pub async fn fetch_response(resource: &str) -> Result<Response> {
    let resp_value = JsFuture::from(window()?.fetch_with_str(resource))
        .await
        .map_err(|err| anyhow!("error fetching '{}' : {:#?}", resource, err))?;
    let resp: Response = resp_value
        .dyn_into()
        .map_err(|element| anyhow!("error converting [{:#?}] to Response", element))?;
    if !resp.ok() {
        return Err(anyhow!("'{}' answered {}", resource, resp.status()));
    }
    Ok(resp)
}

pub async fn fetch_json<T>(json_path: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    let resp = fetch_response(json_path).await?;
    let json = resp
        .json()
        .map_err(|err| anyhow!("Could not get JSON from response [{:#?}]", err))?;

    let json_value = JsFuture::from(json)
        .await
        .map_err(|err| anyhow!("error reading '{}' [{:#?}]", json_path, err))?;

    serde_wasm_bindgen::from_value(json_value)
        .map_err(|err| anyhow!("error converting '{}' : {:#?}", json_path, err))
}

pub async fn fetch_array_buffer(resource: &str) -> Result<ArrayBuffer> {
    let resp = fetch_response(resource).await?;
    let buffer = resp
        .array_buffer()
        .map_err(|err| anyhow!("Could not read '{}' as bytes : {:#?}", resource, err))?;
    JsFuture::from(buffer)
        .await
        .map_err(|err| anyhow!("error reading '{}' : {:#?}", resource, err))?
        .dyn_into::<ArrayBuffer>()
        .map_err(|element| anyhow!("Error converting {:#?} to ArrayBuffer", element))
}

/// RGBA pixels of a loaded image, read back through an offscreen canvas.
pub fn read_pixels(image: &HtmlImageElement) -> Result<Vec<u8>> {
    let (width, height) = (image.natural_width(), image.natural_height());
    let canvas = document()?
        .create_element(html::CANVAS)
        .map_err(|err| anyhow!("Could not create canvas : {:#?}", err))?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|element| anyhow!("Error converting {:#?} to HtmlCanvasElement", element))?;
    canvas.set_width(width);
    canvas.set_height(height);
    let context = context_2d(&canvas)?;
    context
        .draw_image_with_html_image_element(image, 0.0, 0.0)
        .map_err(|err| anyhow!("Could not draw image : {:#?}", err))?;
    let data = context
        .get_image_data(0.0, 0.0, width as f64, height as f64)
        .map_err(|err| anyhow!("Could not read pixels : {:#?}", err))?;
    Ok(data.data().0)
}

// ==================== Input ====================

fn listen(target: &EventTarget, name: &str, handler: impl FnMut(Event) + 'static) -> Result<()> {
    let closure = closure_wrap(Box::new(handler) as Box<dyn FnMut(Event)>);
    target
        .add_event_listener_with_callback(name, closure.as_ref().unchecked_ref())
        .map_err(|err| anyhow!("Could not listen to '{}' : {:#?}", name, err))?;
    // listeners live as long as the page
    closure.forget();
    Ok(())
}

fn send(tx: &UnboundedSender<InputEvent>, event: InputEvent) {
    if tx.unbounded_send(event).is_err() {
        log::debug!("Input channel closed, dropped {:?}", event);
    }
}

/// Canvas relative position of a client point.
fn canvas_point(canvas: &HtmlCanvasElement, client_x: i32, client_y: i32) -> (f64, f64) {
    let rect = canvas.get_bounding_client_rect();
    (client_x as f64 - rect.left(), client_y as f64 - rect.top())
}

/// Forwards DOM input to `tx`: keys from the document, pointer from the
/// canvas (touch on mobile, mouse otherwise) and window resizes.
pub fn listen_input(
    canvas: &HtmlCanvasElement,
    tx: UnboundedSender<InputEvent>,
    mobile: bool,
) -> Result<()> {
    let document = document()?;
    let keys: [(&str, fn(u32) -> InputEvent); 3] = [
        ("keydown", InputEvent::KeyDown),
        ("keyup", InputEvent::KeyUp),
        ("keypress", InputEvent::KeyPressed),
    ];
    for (name, event) in keys {
        let tx = tx.clone();
        listen(&document, name, move |raw: Event| {
            if let Some(key) = raw.dyn_ref::<KeyboardEvent>() {
                send(&tx, event(key.key_code()));
            }
        })?;
    }

    if mobile {
        for name in ["touchstart", "touchmove"] {
            let (tx, target) = (tx.clone(), canvas.clone());
            listen(canvas, name, move |raw: Event| {
                let Some(touch) = raw
                    .dyn_ref::<TouchEvent>()
                    .and_then(|event| event.touches().get(0))
                else {
                    return;
                };
                let (x, y) = canvas_point(&target, touch.client_x(), touch.client_y());
                let event = if raw.type_() == "touchstart" {
                    InputEvent::PointerDown { x, y }
                } else {
                    InputEvent::PointerMove { x, y }
                };
                send(&tx, event);
            })?;
        }
        let up = tx.clone();
        listen(canvas, "touchend", move |_| send(&up, InputEvent::PointerUp))?;
    } else {
        for name in ["mousedown", "mousemove", "click"] {
            let (tx, target) = (tx.clone(), canvas.clone());
            listen(canvas, name, move |raw: Event| {
                let Some(mouse) = raw.dyn_ref::<MouseEvent>() else {
                    return;
                };
                let (x, y) = canvas_point(&target, mouse.client_x(), mouse.client_y());
                let event = match raw.type_().as_str() {
                    "mousedown" => InputEvent::PointerDown { x, y },
                    "mousemove" => InputEvent::PointerMove { x, y },
                    _ => InputEvent::Click { x, y },
                };
                send(&tx, event);
            })?;
        }
        let up = tx.clone();
        listen(canvas, "mouseup", move |_| send(&up, InputEvent::PointerUp))?;
    }

    listen(&*window()?, "resize", move |_| send(&tx, InputEvent::Resize))
}

// ==================== Logging ====================

/// `log` backend writing to the browser console.
pub struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl ConsoleLogger {
    /// Installs the logger once. Later calls only change the level.
    pub fn init(level: LevelFilter) {
        if log::set_logger(&LOGGER).is_err() {
            log::debug!("ConsoleLogger already installed");
        }
        log::set_max_level(level);
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = JsValue::from(format!(
            "[{}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        ));
        match record.level() {
            Level::Error => web_sys::console::error_1(&line),
            Level::Warn => web_sys::console::warn_1(&line),
            Level::Info => web_sys::console::info_1(&line),
            Level::Debug | Level::Trace => web_sys::console::log_1(&line),
        }
    }

    fn flush(&self) {}
}
