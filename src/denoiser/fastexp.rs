/// Approximate `exp(x)` by building the IEEE-754 bit pattern directly.
///
/// `y = x / ln 2 + 127` is the desired unbiased-plus-bias exponent as a real
/// number. Scaling by 2^23 places its integer part in the exponent field and
/// its fraction in the mantissa field, where it acts as a linear
/// approximation of `2^fraction`. The 0.043677448 shift centres the linear
/// segment's error. Monotone and smooth enough for a similarity weight;
/// roughly 3% relative error.
#[inline]
pub fn approx_exp(x: f32) -> f32 {
    const SCALE: f32 = (1u32 << 23) as f32 / std::f32::consts::LN_2;
    const BIAS: f32 = (1u32 << 23) as f32 * (127.0 - 0.043677448);
    const LO: f32 = (1u32 << 23) as f32;
    const HI: f32 = (1u32 << 23) as f32 * 255.0;

    let y = SCALE * x + BIAS;
    if y < LO {
        0.0
    } else if y > HI {
        f32::from_bits(HI as u32)
    } else {
        f32::from_bits(y as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_exp_on_negative_range() {
        let mut x = -10.0f32;
        while x <= 0.0 {
            let exact = x.exp();
            let approx = approx_exp(x);
            let rel = (approx - exact).abs() / exact;
            assert!(rel < 0.04, "x={x}: approx={approx} exact={exact} rel={rel}");
            x += 0.0625;
        }
    }

    #[test]
    fn monotone_non_decreasing() {
        let mut prev = approx_exp(-100.0);
        let mut x = -100.0f32;
        while x <= 0.0 {
            let y = approx_exp(x);
            assert!(y >= prev, "not monotone at x={x}");
            prev = y;
            x += 0.125;
        }
    }

    #[test]
    fn underflows_to_zero() {
        assert_eq!(approx_exp(-90.0), 0.0);
        assert_eq!(approx_exp(-1e10), 0.0);
    }

    #[test]
    fn near_one_at_zero() {
        let y = approx_exp(0.0);
        assert!((y - 1.0).abs() < 0.05, "approx_exp(0) = {y}");
    }
}
