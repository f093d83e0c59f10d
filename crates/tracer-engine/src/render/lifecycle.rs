use crate::device::GpuError;

/// Lifecycle of a lazily built GPU resource.
///
/// `Uninitialized → Configured(C) → Ready(R)`. `C` is whatever is needed to build
/// the resource; `R` is the built resource. Accessors return
/// `GpuError::NotReady` instead of panicking on an absent value.
#[derive(Debug, Clone, Default)]
pub enum Lifecycle<C, R> {
    #[default]
    Uninitialized,
    Configured(C),
    Ready(R),
}

impl<C, R> Lifecycle<C, R> {
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Configured(_) => "configured",
            Self::Ready(_) => "ready",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn configure(&mut self, config: C) {
        *self = Self::Configured(config);
    }

    /// Returns the configuration if the resource has not been built yet.
    pub fn config(&self) -> Option<&C> {
        match self {
            Self::Configured(c) => Some(c),
            _ => None,
        }
    }

    pub fn ready(&self, resource: &'static str) -> Result<&R, GpuError> {
        match self {
            Self::Ready(r) => Ok(r),
            other => Err(GpuError::NotReady {
                resource,
                stage: other.stage(),
            }),
        }
    }

    /// Builds the resource from its configuration, once.
    ///
    /// Already-ready resources are returned as is; `build` is not called again.
    /// On failure the configuration is kept so the caller may retry.
    pub fn get_or_build<F>(&mut self, resource: &'static str, build: F) -> Result<&R, GpuError>
    where
        F: FnOnce(&C) -> Result<R, GpuError>,
    {
        if let Self::Configured(config) = self {
            let built = build(config)?;
            *self = Self::Ready(built);
        }
        self.ready(resource)
    }
}
