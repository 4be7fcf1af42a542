// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use std::fmt::Display;

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    Disabled,
    NoSuchAdapter(#[from] wgpu::RequestAdapterError),
    RequestDeviceError(#[from] wgpu::RequestDeviceError),
    NoRenderableFormat,
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Disabled => write!(f, "GPU disabled by configuration"),
            Error::NoSuchAdapter(e) => write!(f, "No such adapter: {}", e),
            Error::RequestDeviceError(e) => write!(f, "{}", e),
            Error::NoRenderableFormat => write!(
                f,
                "adapter can render neither R32Float nor Rgba8Uint targets"
            ),
        }
    }
}

impl From<Error> for crate::Error {
    fn from(error: Error) -> Self {
        crate::Error::ContextUnavailable(error.to_string())
    }
}
