use std::fmt::{Display, Formatter};

use super::{Log, Position};

impl<T: Display> Display for Log<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Log::None => Ok(()),
            Log::Default(s) | Log::Success(s) | Log::Result(s) | Log::Verbose(s) => {
                write!(f, "{}", s)
            }
        }
    }
}

impl<T> Log<T> {
    /// Severity ordering used to decide whether a given trace line should print.
    pub fn order(&self) -> u8 {
        match self {
            Log::None => 0,
            Log::Default(_) => 1,
            Log::Success(_) => 2,
            Log::Result(_) => 3,
            Log::Verbose(_) => 4,
        }
    }
}

impl<TL: Display> Log<TL> {
    /// Trace a successful token emission at `at`, gated by severity.
    pub fn trace_token(&self, label: &str, token_text: &str, at: Position) {
        #[cfg(debug_assertions)]
        if self.order() >= Log::Success(()).order() {
            println!("[{}; {}]: {:?} at {}", self, label, token_text, at);
        }
        #[cfg(not(debug_assertions))]
        {
            let _ = (label, token_text, at);
        }
    }

    /// Trace an arbitrary diagnostic line at [`Log::Result`] severity or above.
    pub fn trace_result(&self, message: &str) {
        #[cfg(debug_assertions)]
        if self.order() >= Log::Result(()).order() {
            println!("[{}]: {}", self, message);
        }
        #[cfg(not(debug_assertions))]
        let _ = message;
    }

    /// Trace fine-grained algorithm progress (FIRST/FOLLOW fixed-point rounds,
    /// rule-entry stack transitions) at [`Log::Verbose`] severity.
    pub fn trace_verbose(&self, message: &str) {
        #[cfg(debug_assertions)]
        if self.order() >= Log::Verbose(()).order() {
            println!("[{}]: {}", self, message);
        }
        #[cfg(not(debug_assertions))]
        let _ = message;
    }
}
