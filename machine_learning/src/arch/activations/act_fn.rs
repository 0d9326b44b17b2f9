use super::Relu;

/// An activation function fused at the output of a dense layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ActFn {
    Relu(Relu),
}

impl ActFn {
    pub fn relu() -> Self {
        Self::Relu(Relu::new())
    }

    pub fn f(&self, x: f32) -> f32 {
        match self {
            Self::Relu(a) => a.f(x),
        }
    }

    pub fn df(&self, x: f32) -> f32 {
        match self {
            Self::Relu(a) => a.df(x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relu_clamps_negative_inputs() {
        let act = ActFn::relu();
        assert_eq!(act.f(-2.), 0.);
        assert_eq!(act.f(3.), 3.);
        assert_eq!(act.df(-2.), 0.);
        assert_eq!(act.df(3.), 1.);
    }
}
