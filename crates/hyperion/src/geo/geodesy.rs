//! Vincenty's formulae on the WGS-84 ellipsoid

use hyperion_core::Coordinates;

/// Semi-major axis in km
const A: f64 = 6378.137;
/// Flattening
const F: f64 = 1.0 / 298.257_223_563;
/// Semi-minor axis in km
const B: f64 = A * (1.0 - F);

const CONVERGENCE: f64 = 1e-12;
const MAX_ITERATIONS: usize = 200;

/// Semi-minor axis; the shortest radius of the ellipsoid, in km
pub const POLAR_RADIUS_KM: f64 = B;

/// Ellipsoidal distance between two points in km (Vincenty inverse)
///
/// Nearly antipodal points may not converge; the last iterate is returned,
/// which is accurate to well under a kilometre.
pub fn distance_km(from: &Coordinates, to: &Coordinates) -> f64 {
    let l = (to.longitude - from.longitude).to_radians();
    let u1 = ((1.0 - F) * from.latitude.to_radians().tan()).atan();
    let u2 = ((1.0 - F) * to.latitude.to_radians().tan()).atan();
    let (sin_u1, cos_u1) = u1.sin_cos();
    let (sin_u2, cos_u2) = u2.sin_cos();

    let mut lambda = l;
    let mut sin_sigma = 0.0;
    let mut cos_sigma = 0.0;
    let mut sigma = 0.0;
    let mut cos_sq_alpha = 0.0;
    let mut cos_2sigma_m = 0.0;

    for _ in 0..MAX_ITERATIONS {
        let (sin_lambda, cos_lambda) = lambda.sin_cos();
        let t1 = cos_u2 * sin_lambda;
        let t2 = cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda;
        sin_sigma = (t1 * t1 + t2 * t2).sqrt();
        if sin_sigma == 0.0 {
            return 0.0;
        }
        cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
        sigma = sin_sigma.atan2(cos_sigma);

        let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
        cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
        // equatorial line
        cos_2sigma_m = if cos_sq_alpha == 0.0 {
            0.0
        } else {
            cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
        };

        let c = F / 16.0 * cos_sq_alpha * (4.0 + F * (4.0 - 3.0 * cos_sq_alpha));
        let previous = lambda;
        lambda = l
            + (1.0 - c)
                * F
                * sin_alpha
                * (sigma
                    + c * sin_sigma
                        * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)));

        if (lambda - previous).abs() < CONVERGENCE {
            break;
        }
    }

    let u_sq = cos_sq_alpha * (A * A - B * B) / (B * B);
    let (big_a, big_b) = series(u_sq);
    let delta_sigma = delta_sigma(big_b, sin_sigma, cos_sigma, cos_2sigma_m);

    B * big_a * (sigma - delta_sigma)
}

/// Point reached travelling `distance_km` from `from` on an initial
/// `bearing_deg` (clockwise from north), Vincenty direct
pub fn destination(from: &Coordinates, bearing_deg: f64, distance_km: f64) -> Coordinates {
    let (sin_alpha1, cos_alpha1) = bearing_deg.to_radians().sin_cos();

    let tan_u1 = (1.0 - F) * from.latitude.to_radians().tan();
    let cos_u1 = 1.0 / (1.0 + tan_u1 * tan_u1).sqrt();
    let sin_u1 = tan_u1 * cos_u1;

    let sigma1 = tan_u1.atan2(cos_alpha1);
    let sin_alpha = cos_u1 * sin_alpha1;
    let cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
    let u_sq = cos_sq_alpha * (A * A - B * B) / (B * B);
    let (big_a, big_b) = series(u_sq);

    let base = distance_km / (B * big_a);
    let mut sigma = base;
    for _ in 0..MAX_ITERATIONS {
        let cos_2sigma_m = (2.0 * sigma1 + sigma).cos();
        let previous = sigma;
        sigma = base + delta_sigma(big_b, sigma.sin(), sigma.cos(), cos_2sigma_m);
        if (sigma - previous).abs() < CONVERGENCE {
            break;
        }
    }
    let (sin_sigma, cos_sigma) = sigma.sin_cos();
    let cos_2sigma_m = (2.0 * sigma1 + sigma).cos();

    let x = sin_u1 * sin_sigma - cos_u1 * cos_sigma * cos_alpha1;
    let latitude = (sin_u1 * cos_sigma + cos_u1 * sin_sigma * cos_alpha1)
        .atan2((1.0 - F) * (sin_alpha * sin_alpha + x * x).sqrt());
    let lambda =
        (sin_sigma * sin_alpha1).atan2(cos_u1 * cos_sigma - sin_u1 * sin_sigma * cos_alpha1);

    let c = F / 16.0 * cos_sq_alpha * (4.0 + F * (4.0 - 3.0 * cos_sq_alpha));
    let l = lambda
        - (1.0 - c)
            * F
            * sin_alpha
            * (sigma
                + c * sin_sigma
                    * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)));

    Coordinates::new(
        latitude.to_degrees(),
        normalize_longitude(from.longitude + l.to_degrees()),
    )
}

/// Wrap a longitude into [-180, 180]
pub fn normalize_longitude(longitude: f64) -> f64 {
    if (-180.0..=180.0).contains(&longitude) {
        return longitude;
    }
    let wrapped = (longitude + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && longitude > 0.0 {
        180.0
    } else {
        wrapped
    }
}

fn series(u_sq: f64) -> (f64, f64) {
    let a = 1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
    let b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
    (a, b)
}

fn delta_sigma(b: f64, sin_sigma: f64, cos_sigma: f64, cos_2sigma_m: f64) -> f64 {
    let c2 = cos_2sigma_m * cos_2sigma_m;
    b * sin_sigma
        * (cos_2sigma_m
            + b / 4.0
                * (cos_sigma * (-1.0 + 2.0 * c2)
                    - b / 6.0 * cos_2sigma_m * (-3.0 + 4.0 * sin_sigma * sin_sigma) * (-3.0 + 4.0 * c2)))
}
