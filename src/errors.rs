error_chain! {
    foreign_links {
        Fmt(::std::fmt::Error);
        Io(::std::io::Error);
        Utf8(::std::string::FromUtf8Error);
        Json(::json::Error);
        Png(::png::EncodingError);
    }

    errors {
        /// Malformed input at byte offset `pos`.
        Format(pos: usize, reason: String) {
            description("malformed file")
            display("malformed file at {:#x}: {}", pos, reason)
        }
        /// Data that is well-formed but not representable in the target
        /// (file type, animation/model mismatch, ...).
        Incompatible(reason: String) {
            description("incompatible data")
            display("incompatible: {}", reason)
        }
        Shader(log: String, source: String) {
            description("shader compilation failed")
            display("shader compilation failed:\n{}", log)
        }
        Gl(reason: String) {
            description("graphics error")
            display("graphics error: {}", reason)
        }
    }
}

/// Shorthand for a `Format` error.
pub fn format_error<S: Into<String>>(pos: usize, reason: S) -> Error {
    ErrorKind::Format(pos, reason.into()).into()
}

pub fn incompatible<S: Into<String>>(reason: S) -> Error {
    ErrorKind::Incompatible(reason.into()).into()
}

/// Wraps any glium error whose concrete type we don't want to name.
pub fn gl_error<E: ::std::fmt::Debug>(e: E) -> Error {
    ErrorKind::Gl(format!("{:?}", e)).into()
}

macro_rules! check {
    ($b:expr) => {
        if !$b {
            Err($crate::errors::Error::from_kind($crate::errors::ErrorKind::Msg(format!(
                "expected: {}",
                stringify!($b)
            ))))
        } else {
            Ok(())
        }
    };
}
