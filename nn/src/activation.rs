/// Pointwise activation functions usable both as layer nonlinearities and in
/// closed-form derivatives during backprop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActFn {
    Relu,
    Sigmoid,
}

impl ActFn {
    /// Applies the activation to a single pre-activation value.
    #[inline]
    pub fn f(self, z: f32) -> f32 {
        match self {
            ActFn::Relu => z.max(0.0),
            ActFn::Sigmoid => 1.0 / (1.0 + (-z).exp()),
        }
    }

    /// Derivative of the activation at pre-activation `z`.
    #[inline]
    pub fn df(self, z: f32) -> f32 {
        match self {
            ActFn::Relu => {
                if z > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            ActFn::Sigmoid => {
                let s = self.f(z);
                s * (1.0 - s)
            }
        }
    }
}
