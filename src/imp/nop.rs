// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Backend used when no GPU backend is compiled in.
//!
//! Every type is uninhabited: a device can never be created, so nothing else can be either, and
//! every numeric kernel runs on the CPU.

use crate::codec::Encoding;
use crate::config::ContextOptions;
use crate::matrix::Matrix;
use std::convert::Infallible;
use std::fmt::Display;

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    NoBackend,
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NoBackend => write!(f, "no GPU backend compiled in"),
        }
    }
}

impl From<Error> for crate::Error {
    fn from(error: Error) -> Self {
        crate::Error::ContextUnavailable(error.to_string())
    }
}

#[derive(Debug)]
pub(crate) struct Device(Infallible);

impl Device {
    pub async fn new(_options: &ContextOptions) -> Result<Device, Error> {
        Err(Error::NoBackend)
    }

    pub fn encoding(&self) -> Encoding {
        match self.0 {}
    }

    pub fn max_texture_dimension(&self) -> u32 {
        match self.0 {}
    }

    pub fn adapter_name(&self) -> &str {
        match self.0 {}
    }
}

#[derive(Debug)]
pub(crate) struct Texture(Infallible);

impl Texture {
    pub fn upload(device: &Device, _debug_name: &str, _matrix: &Matrix) -> Result<Self, crate::Error> {
        match device.0 {}
    }

    pub fn width(&self) -> u32 {
        match self.0 {}
    }

    pub fn height(&self) -> u32 {
        match self.0 {}
    }

    pub fn debug_name(&self) -> &str {
        match self.0 {}
    }
}

#[derive(Debug)]
pub(crate) struct Program(Infallible);

impl Program {
    pub fn compile(
        device: &Device,
        _label: &str,
        _wgsl: &str,
        _input_count: usize,
        _uniform_size: u64,
    ) -> Result<Self, crate::Error> {
        match device.0 {}
    }
}

#[derive(Debug)]
pub(crate) struct Framebuffer(Infallible);

impl Framebuffer {
    pub fn new(device: &Device) -> Self {
        match device.0 {}
    }

    pub fn attach(&mut self, _device: &Device, _width: u32, _height: u32) -> Result<(), crate::Error> {
        match self.0 {}
    }

    pub fn detach(&mut self) {
        match self.0 {}
    }

    pub fn draw(
        &mut self,
        _device: &Device,
        _program: &Program,
        _inputs: &[&Texture],
        _uniforms: &[u8],
    ) -> Result<(), crate::Error> {
        match self.0 {}
    }

    pub fn read_back(&mut self, _device: &Device) -> Result<Matrix, crate::Error> {
        match self.0 {}
    }

    pub fn read_texture(&mut self, _device: &Device, _texture: &Texture) -> Result<Matrix, crate::Error> {
        match self.0 {}
    }
}
