//! Panic capture at the handler boundary.
//!
//! [`invoke`] (synchronous) and [`CaptureFuture`] (asynchronous) are the only
//! places where unwinding is turned into values. Past this boundary every
//! failure is an ordinary [`BoxError`].
//!
//! While a capture is running on the current thread, a chained panic hook
//! records where the panic happened: the file and line from the panic
//! location, and the first user function found by walking the backtrace.
//! Outside a capture the previous hook runs unchanged.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe, Location, PanicHookInfo};
use std::path::Path;
use std::pin::Pin;
use std::sync::Once;
use std::task::{Context, Poll};

use crate::{BoxError, HttpError};

// ============================================================================
// Call Site
// ============================================================================

/// Where a panic originated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    function: Option<String>,
    file: String,
    line: u32,
}

impl CallSite {
    /// Creates a call site.
    pub fn new(function: Option<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            function,
            file: file.into(),
            line,
        }
    }

    /// Short name of the panicking function, when it could be resolved.
    #[must_use]
    pub fn function(&self) -> Option<&str> {
        self.function.as_deref()
    }

    /// File name (without directories).
    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Line number.
    #[must_use]
    pub const fn line(&self) -> u32 {
        self.line
    }

    /// Resolve the call site of the panic being raised.
    fn resolve(location: Option<&Location<'_>>) -> Option<Self> {
        let location = location?;
        let trace = Backtrace::force_capture().to_string();
        Some(Self::new(
            first_user_frame(&trace),
            base_name(location.file()),
            location.line(),
        ))
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.function {
            Some(function) => write!(f, "[{function} {}:{}]", self.file, self.line),
            None => write!(f, "[{}:{}]", self.file, self.line),
        }
    }
}

/// Frames belonging to the runtime's panic machinery.
const RUNTIME_PREFIXES: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "rust_begin_unwind",
    "rust_panic",
    "__rust",
    "__rustc::",
];

/// This module's own frames (the hook and the resolution), except its tests.
const CAPTURE_MODULE: &str = module_path!();

fn is_internal_frame(name: &str) -> bool {
    let name = name.trim_start_matches('<');
    if RUNTIME_PREFIXES.iter().any(|prefix| name.starts_with(prefix)) {
        return true;
    }
    name.strip_prefix(CAPTURE_MODULE)
        .is_some_and(|rest| rest.starts_with("::") && !rest.starts_with("::tests"))
}

/// Parse a frame header line (`  12: crate::module::function`).
fn frame_name(line: &str) -> Option<&str> {
    let (index, name) = line.trim_start().split_once(": ")?;
    let is_index = !index.is_empty() && index.bytes().all(|byte| byte.is_ascii_digit());
    is_index.then(|| name.trim())
}

/// First frame of the rendered backtrace that is neither runtime nor capture
/// machinery, shortened to `module::function`.
fn first_user_frame(trace: &str) -> Option<String> {
    trace
        .lines()
        .filter_map(frame_name)
        .find(|name| !name.is_empty() && !name.starts_with("<unknown>") && !is_internal_frame(name))
        .map(short_function_name)
}

/// `my_app::handlers::get_user::{{closure}}::h0123456789abcdef` → `handlers::get_user`.
fn short_function_name(name: &str) -> String {
    let name = strip_hash(name);
    let segments: Vec<&str> = name
        .split("::")
        .filter(|segment| !segment.is_empty() && *segment != "{{closure}}")
        .collect();
    let start = segments.len().saturating_sub(2);
    segments.get(start..).unwrap_or_default().join("::")
}

fn strip_hash(name: &str) -> &str {
    match name.rsplit_once("::h") {
        Some((head, hash))
            if hash.len() == 16 && hash.bytes().all(|byte| byte.is_ascii_hexdigit()) =>
        {
            head
        }
        _ => name,
    }
}

fn base_name(file: &str) -> &str {
    Path::new(file)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(file)
}

// ============================================================================
// Panic Hook
// ============================================================================

thread_local! {
    /// Number of active captures on this thread.
    static CAPTURE_DEPTH: Cell<usize> = const { Cell::new(0) };
    /// Call sites of panics raised inside a capture, tagged with the depth of
    /// the capture that was innermost when the hook ran.
    static CALL_SITES: RefCell<Vec<(usize, CallSite)>> = const { RefCell::new(Vec::new()) };
}

fn capture_depth() -> usize {
    CAPTURE_DEPTH.try_with(Cell::get).unwrap_or(0)
}

fn install_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| {
            let depth = capture_depth();
            if depth == 0 {
                previous(info);
                return;
            }
            let site = CallSite::resolve(info.location());
            let _ = CALL_SITES.try_with(|sites| {
                let Ok(mut sites) = sites.try_borrow_mut() else {
                    return;
                };
                sites.retain(|(at, _)| *at < depth);
                sites.extend(site.map(|site| (depth, site)));
            });
        }));
    });
}

/// Take the call site recorded for the innermost active capture.
fn take_call_site() -> Option<CallSite> {
    let depth = capture_depth();
    CALL_SITES
        .try_with(|sites| {
            let mut sites = sites.try_borrow_mut().ok()?;
            sites.pop_if(|(at, _)| *at == depth).map(|(_, site)| site)
        })
        .ok()
        .flatten()
}

/// Forget the call sites recorded at `depth` or deeper.
fn forget_call_sites(depth: usize) {
    let _ = CALL_SITES.try_with(|sites| {
        if let Ok(mut sites) = sites.try_borrow_mut() {
            sites.retain(|(at, _)| *at < depth);
        }
    });
}

/// Marks the current thread as capturing for its lifetime.
///
/// A scope only sees call sites recorded while it is active: stale records
/// are dropped on entry and on exit.
struct CaptureScope;

impl CaptureScope {
    fn enter() -> Self {
        install_hook();
        let depth = CAPTURE_DEPTH.with(|depth| {
            depth.set(depth.get() + 1);
            depth.get()
        });
        forget_call_sites(depth);
        Self
    }
}

impl Drop for CaptureScope {
    fn drop(&mut self) {
        let depth = capture_depth();
        forget_call_sites(depth);
        let _ = CAPTURE_DEPTH.try_with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

// ============================================================================
// Panic Value
// ============================================================================

/// What a handler panicked with.
#[derive(Debug)]
pub enum PanicPayload {
    /// The panic carried an error (`std::panic::panic_any(err)`).
    Error(BoxError),
    /// The panic carried another value, rendered with its type.
    Value {
        /// Type of the payload, e.g. `i32` or `&str`.
        type_name: &'static str,
        /// The payload's `Display` output.
        text: String,
    },
    /// The payload type is not known to faultline.
    ///
    /// A panic cannot be inspected beyond downcasting, so the text of an
    /// unknown error type is lost. Panic with an [`HttpError`] or a
    /// [`BoxError`] to keep the message:
    /// `std::panic::panic_any(BoxError::from(MyError))`.
    Opaque,
}

impl PanicPayload {
    /// Convert a raw payload caught by [`std::panic::catch_unwind`].
    ///
    /// Errors are recognized when the payload is an [`HttpError`], a
    /// [`BoxError`] or an [`std::io::Error`]. Strings, primitives and
    /// [`http::StatusCode`] are rendered with their type. Anything else is
    /// [`PanicPayload::Opaque`].
    #[must_use]
    pub fn from_any(payload: Box<dyn Any + Send>) -> Self {
        let payload = match payload.downcast::<HttpError>() {
            Ok(error) => return Self::Error(error),
            Err(payload) => payload,
        };
        let payload = match payload.downcast::<BoxError>() {
            Ok(error) => return Self::Error(*error),
            Err(payload) => payload,
        };
        let payload = match payload.downcast::<std::io::Error>() {
            Ok(error) => return Self::Error(error),
            Err(payload) => payload,
        };

        macro_rules! describe {
            ($($name:literal => $ty:ty),+ $(,)?) => {
                $(
                    if let Some(value) = payload.downcast_ref::<$ty>() {
                        return Self::Value { type_name: $name, text: value.to_string() };
                    }
                )+
            };
        }

        describe! {
            "&str" => &'static str,
            "String" => String,
            "i8" => i8,
            "i16" => i16,
            "i32" => i32,
            "i64" => i64,
            "i128" => i128,
            "isize" => isize,
            "u8" => u8,
            "u16" => u16,
            "u32" => u32,
            "u64" => u64,
            "u128" => u128,
            "usize" => usize,
            "f32" => f32,
            "f64" => f64,
            "bool" => bool,
            "char" => char,
            "StatusCode" => http::StatusCode,
        }

        Self::Opaque
    }
}

impl fmt::Display for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(error) => fmt::Display::fmt(error, f),
            Self::Value { type_name, text } => write!(f, "({type_name}) {text}"),
            Self::Opaque => f.write_str("(Box<dyn Any>) opaque panic payload"),
        }
    }
}

/// A panic converted into an error, with its call site when resolved.
///
/// Its `Display` is the payload prefixed with the call site:
/// `[handlers::get_user users.rs:42] (&str) boom`.
///
/// Only payloads faultline knows how to read keep their text (see
/// [`PanicPayload::from_any`]). Handlers that panic with their own error type
/// should box it first, or use an [`HttpError`] to pick the status.
#[derive(Debug)]
pub struct Panic {
    payload: PanicPayload,
    call_site: Option<CallSite>,
}

impl Panic {
    /// Creates a panic value.
    #[must_use]
    pub const fn new(payload: PanicPayload, call_site: Option<CallSite>) -> Self {
        Self { payload, call_site }
    }

    /// What the handler panicked with.
    #[must_use]
    pub const fn payload(&self) -> &PanicPayload {
        &self.payload
    }

    /// Where the panic originated, when resolved.
    #[must_use]
    pub const fn call_site(&self) -> Option<&CallSite> {
        self.call_site.as_ref()
    }

    /// Consume into payload and call site.
    #[must_use]
    pub fn into_parts(self) -> (PanicPayload, Option<CallSite>) {
        (self.payload, self.call_site)
    }

    fn caught(payload: Box<dyn Any + Send>) -> Self {
        Self::new(PanicPayload::from_any(payload), take_call_site())
    }
}

impl fmt::Display for Panic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.call_site {
            Some(site) => write!(f, "{site} {}", self.payload),
            None => fmt::Display::fmt(&self.payload, f),
        }
    }
}

impl std::error::Error for Panic {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.payload {
            PanicPayload::Error(error) => Some(error.as_ref()),
            _ => None,
        }
    }
}

// ============================================================================
// Capture
// ============================================================================

/// Result of a captured invocation.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The call returned normally.
    Completed(T),
    /// The call panicked before returning.
    Panicked(Panic),
    /// The call returned, then panicked while its state was being released.
    ///
    /// Only futures produce this: a future is dropped inside the capture once
    /// it completes.
    CompletedThenPanicked(T, Panic),
    /// The call panicked, then panicked again while its state was being
    /// released. The first panic comes first.
    PanickedTwice(Panic, Panic),
}

impl<T> Outcome<T> {
    /// The returned value, if any.
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) | Self::CompletedThenPanicked(value, _) => Some(value),
            Self::Panicked(_) | Self::PanickedTwice(..) => None,
        }
    }

    /// Returns `true` if a panic was captured.
    pub const fn is_panicked(&self) -> bool {
        !matches!(self, Self::Completed(_))
    }
}

/// Run `f`, converting a panic into [`Outcome::Panicked`].
///
/// # Example
///
/// ```
/// use faultline_core::capture::{Outcome, invoke};
///
/// let outcome = invoke(|| -> u32 { std::panic::panic_any(418_i32) });
/// let Outcome::Panicked(panic) = outcome else { panic!("expected a panic") };
/// assert!(panic.to_string().ends_with("(i32) 418"));
/// ```
pub fn invoke<T>(f: impl FnOnce() -> T) -> Outcome<T> {
    let _scope = CaptureScope::enter();
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Outcome::Completed(value),
        Err(payload) => Outcome::Panicked(Panic::caught(payload)),
    }
}

/// Future capturing panics raised while polling (or dropping) `F`.
///
/// The inner future is dropped inside the capture as soon as it completes, so a
/// panic raised by its destructor is reported too.
#[must_use = "futures do nothing unless polled"]
pub struct CaptureFuture<F> {
    inner: Option<Pin<Box<F>>>,
}

impl<F: Future> CaptureFuture<F> {
    /// Wrap a future.
    pub fn new(future: F) -> Self {
        Self {
            inner: Some(Box::pin(future)),
        }
    }
}

impl<F> fmt::Debug for CaptureFuture<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureFuture")
            .field("completed", &self.inner.is_none())
            .finish()
    }
}

impl<F: Future> Future for CaptureFuture<F> {
    type Output = Outcome<F::Output>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let _scope = CaptureScope::enter();
        let Some(inner) = self.inner.as_mut() else {
            panic!("CaptureFuture polled after completion");
        };

        match panic::catch_unwind(AssertUnwindSafe(|| inner.as_mut().poll(cx))) {
            Ok(Poll::Pending) => Poll::Pending,
            Ok(Poll::Ready(value)) => {
                let inner = self.inner.take();
                match panic::catch_unwind(AssertUnwindSafe(move || drop(inner))) {
                    Ok(()) => Poll::Ready(Outcome::Completed(value)),
                    Err(payload) => {
                        Poll::Ready(Outcome::CompletedThenPanicked(value, Panic::caught(payload)))
                    }
                }
            }
            Err(payload) => {
                let first = Panic::caught(payload);
                let inner = self.inner.take();
                match panic::catch_unwind(AssertUnwindSafe(move || drop(inner))) {
                    Ok(()) => Poll::Ready(Outcome::Panicked(first)),
                    Err(payload) => {
                        Poll::Ready(Outcome::PanickedTwice(first, Panic::caught(payload)))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::pin::pin;
    use std::task::Waker;

    use http::StatusCode;

    use super::*;

    #[test]
    fn invoke_returns_value() {
        let outcome = invoke(|| 42);
        assert!(matches!(outcome, Outcome::Completed(42)));
    }

    #[test]
    fn invoke_captures_str_panic() {
        let outcome = invoke(|| -> () { panic!("fail") });
        let Outcome::Panicked(panic) = outcome else {
            panic!("expected a panic");
        };
        assert!(matches!(
            panic.payload(),
            PanicPayload::Value { type_name: "&str", .. }
        ));
        assert!(panic.to_string().ends_with("(&str) fail"));
    }

    #[test]
    fn invoke_captures_formatted_panic_as_string() {
        let code = 7;
        let outcome = invoke(|| -> () { panic!("fail {code}") });
        let Outcome::Panicked(panic) = outcome else {
            panic!("expected a panic");
        };
        assert!(panic.to_string().ends_with("(String) fail 7"));
    }

    #[test]
    fn invoke_captures_integer_panic() {
        let outcome = invoke(|| -> () { panic::panic_any(418_i32) });
        let Outcome::Panicked(panic) = outcome else {
            panic!("expected a panic");
        };
        assert_eq!(panic.payload().to_string(), "(i32) 418");
    }

    #[test]
    fn invoke_captures_http_error_panic() {
        let outcome = invoke(|| -> () {
            panic::panic_any(HttpError::msg(StatusCode::IM_A_TEAPOT, "fail"))
        });
        let Outcome::Panicked(panic) = outcome else {
            panic!("expected a panic");
        };
        let PanicPayload::Error(error) = panic.payload() else {
            panic!("expected an error payload");
        };
        let error = error.downcast_ref::<HttpError>().expect("http error");
        assert_eq!(error.status(), StatusCode::IM_A_TEAPOT);
    }

    #[test]
    fn invoke_captures_opaque_panic() {
        struct Secret;
        let outcome = invoke(|| -> () { panic::panic_any(Secret) });
        let Outcome::Panicked(panic) = outcome else {
            panic!("expected a panic");
        };
        assert!(matches!(panic.payload(), PanicPayload::Opaque));
    }

    #[test]
    fn panic_call_site_points_at_the_handler() {
        let outcome = invoke(|| -> () { panic!("boom") });
        let Outcome::Panicked(panic) = outcome else {
            panic!("expected a panic");
        };

        let site = panic.call_site().expect("call site");
        assert_eq!(site.file(), "capture.rs");
        assert!(site.line() > 0);
        if let Some(function) = site.function() {
            assert!(
                function.contains("panic_call_site_points_at_the_handler"),
                "unexpected function {function}"
            );
        }
        assert!(panic.to_string().starts_with('['));
    }

    #[test]
    fn hook_is_inert_outside_captures() {
        let _ = invoke(|| ());
        let caught = panic::catch_unwind(|| panic!("not captured"));
        assert!(caught.is_err());
        assert_eq!(take_call_site(), None);
    }

    #[test]
    fn nested_invoke_keeps_outer_scope_active() {
        let outcome = invoke(|| -> () {
            let inner = invoke(|| -> () { panic!("inner") });
            assert!(inner.is_panicked());
            panic!("outer")
        });
        let Outcome::Panicked(panic) = outcome else {
            panic!("expected a panic");
        };
        assert!(panic.call_site().is_some());
        assert!(panic.to_string().ends_with("(&str) outer"));
    }

    #[test]
    fn swallowed_panic_leaves_no_call_site_behind() {
        let outcome = invoke(|| {
            let swallowed = panic::catch_unwind(|| -> () { panic!("swallowed") });
            assert!(swallowed.is_err());
        });
        assert!(matches!(outcome, Outcome::Completed(())));

        // `resume_unwind` does not run the hook.
        let outcome = invoke(|| -> () { panic::resume_unwind(Box::new(418_i32)) });
        let Outcome::Panicked(panic) = outcome else {
            panic!("expected a panic");
        };
        assert_eq!(panic.call_site(), None);
        assert_eq!(panic.to_string(), "(i32) 418");
    }

    #[test]
    fn inner_capture_does_not_take_outer_call_site() {
        let outcome = invoke(|| -> () {
            let swallowed = panic::catch_unwind(|| -> () { panic!("swallowed") });
            assert!(swallowed.is_err());
            let inner = invoke(|| -> () { panic::resume_unwind(Box::new(7_u8)) });
            let Outcome::Panicked(inner) = inner else {
                panic!("expected a panic");
            };
            assert_eq!(inner.call_site(), None);
            panic!("outer")
        });
        let Outcome::Panicked(panic) = outcome else {
            panic!("expected a panic");
        };
        assert!(panic.call_site().is_some());
    }

    #[test]
    fn boxed_user_error_keeps_its_message() {
        #[derive(Debug)]
        struct OutOfBeans;

        impl fmt::Display for OutOfBeans {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("out of beans")
            }
        }

        impl std::error::Error for OutOfBeans {}

        let outcome = invoke(|| -> () { panic::panic_any(OutOfBeans) });
        let Outcome::Panicked(panic) = outcome else {
            panic!("expected a panic");
        };
        assert!(matches!(panic.payload(), PanicPayload::Opaque));

        let outcome = invoke(|| -> () { panic::panic_any(BoxError::from(OutOfBeans)) });
        let Outcome::Panicked(panic) = outcome else {
            panic!("expected a panic");
        };
        assert!(matches!(panic.payload(), PanicPayload::Error(_)));
        assert!(panic.to_string().ends_with("] out of beans"));
    }

    /// Panics when polled, and again when dropped.
    struct PanicsTwice;

    impl Future for PanicsTwice {
        type Output = ();

        fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
            panic!("polled")
        }
    }

    impl Drop for PanicsTwice {
        fn drop(&mut self) {
            panic::panic_any("dropped");
        }
    }

    #[test]
    fn panic_while_dropping_a_panicked_future_is_returned() {
        let mut future = pin!(CaptureFuture::new(PanicsTwice));
        let mut cx = Context::from_waker(Waker::noop());

        let Poll::Ready(outcome) = future.as_mut().poll(&mut cx) else {
            panic!("expected a ready outcome");
        };
        assert!(outcome.is_panicked());
        let Outcome::PanickedTwice(first, second) = outcome else {
            panic!("expected two panics");
        };
        assert!(first.to_string().ends_with("(&str) polled"));
        assert!(second.to_string().ends_with("(&str) dropped"));
        assert!(second.call_site().is_some());
    }

    #[test]
    fn frame_name_parses_headers_only() {
        assert_eq!(frame_name("   3: my_app::handler"), Some("my_app::handler"));
        assert_eq!(frame_name("  12: <T as core::ops::Fn>::call"), Some("<T as core::ops::Fn>::call"));
        assert_eq!(frame_name("             at ./src/main.rs:10:5"), None);
        assert_eq!(frame_name("stack backtrace:"), None);
    }

    #[test]
    fn first_user_frame_skips_runtime_and_capture() {
        let trace = "\
   0: std::backtrace_rs::backtrace::libunwind::trace
             at /rustc/library/std/src/../../backtrace/src/backtrace/libunwind.rs:116:5
   1: std::backtrace::Backtrace::create
   2: faultline_core::capture::CallSite::resolve
   3: faultline_core::capture::install_hook::{{closure}}::{{closure}}
   4: <alloc::boxed::Box<F,A> as core::ops::function::Fn<Args>>::call
   5: std::panicking::rust_panic_with_hook
   6: std::panicking::begin_panic_handler::{{closure}}
   7: __rustc::rust_begin_unwind
   8: core::panicking::panic_fmt
   9: core::option::unwrap_failed
  10: my_app::handlers::get_user::{{closure}}
             at ./src/handlers.rs:42:9
  11: <faultline_core::capture::CaptureFuture<F> as core::future::future::Future>::poll
";
        assert_eq!(first_user_frame(trace), Some("handlers::get_user".to_string()));
    }

    #[test]
    fn first_user_frame_without_symbols() {
        let trace = "   0: <unknown>\n   1: <unknown>\n";
        assert_eq!(first_user_frame(trace), None);
    }

    #[test]
    fn short_function_name_strips_hash_and_closures() {
        assert_eq!(
            short_function_name("my_app::api::create::{{closure}}::h0123456789abcdef"),
            "api::create"
        );
        assert_eq!(short_function_name("main"), "main");
    }

    #[test]
    fn call_site_display() {
        let site = CallSite::new(Some("api::create".to_string()), "api.rs", 12);
        assert_eq!(site.to_string(), "[api::create api.rs:12]");

        let site = CallSite::new(None, "api.rs", 12);
        assert_eq!(site.to_string(), "[api.rs:12]");
    }

    #[test]
    fn base_name_drops_directories() {
        assert_eq!(base_name("src/handlers/users.rs"), "users.rs");
        assert_eq!(base_name("users.rs"), "users.rs");
    }
}
