//! Geodesic distance and the proximity filter.
//!
//! Distances are measured on the WGS-84 ellipsoid with Vincenty's inverse
//! formula. For nearly antipodal points, where the iteration does not
//! converge, the great-circle distance on the mean earth radius is used.

use crate::error::HygieiaError;
use crate::model::{Coordinate, Facility, NearbyFacility};

/// Radius used by proximity queries when the caller does not supply one.
pub const DEFAULT_RADIUS_KM: f64 = 2.0;

/// WGS-84 semi-major axis in kilometers.
pub const WGS84_SEMI_MAJOR_KM: f64 = 6378.137;

/// WGS-84 flattening.
pub const WGS84_FLATTENING: f64 = 1.0 / 298.257_223_563;

/// Mean earth radius in kilometers (IUGG).
pub const MEAN_EARTH_RADIUS_KM: f64 = 6371.008_8;

const MAX_ITERATIONS: usize = 200;
const CONVERGENCE_RAD: f64 = 1e-12;

/// Distance between two coordinates in kilometers.
#[must_use]
pub fn geodesic_distance_km(from: &Coordinate, to: &Coordinate) -> f64 {
    vincenty_inverse_km(from, to).unwrap_or_else(|| great_circle_distance_km(from, to))
}

/// Great-circle distance on a sphere of [`MEAN_EARTH_RADIUS_KM`].
#[must_use]
pub fn great_circle_distance_km(from: &Coordinate, to: &Coordinate) -> f64 {
    let (lat1, lat2) = (from.lat.to_radians(), to.lat.to_radians());
    let d_lat = lat2 - lat1;
    let d_lon = (to.lon - from.lon).to_radians();

    let hav = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let central_angle = 2.0 * hav.sqrt().atan2((1.0 - hav).sqrt());

    MEAN_EARTH_RADIUS_KM * central_angle
}

/// Vincenty's inverse solution; `None` when the iteration fails to converge.
fn vincenty_inverse_km(from: &Coordinate, to: &Coordinate) -> Option<f64> {
    let semi_major = WGS84_SEMI_MAJOR_KM;
    let flattening = WGS84_FLATTENING;
    let semi_minor = (1.0 - flattening) * semi_major;

    let lon_delta = (to.lon - from.lon).to_radians();
    let reduced1 = ((1.0 - flattening) * from.lat.to_radians().tan()).atan();
    let reduced2 = ((1.0 - flattening) * to.lat.to_radians().tan()).atan();
    let (sin_u1, cos_u1) = reduced1.sin_cos();
    let (sin_u2, cos_u2) = reduced2.sin_cos();

    let mut lambda = lon_delta;
    for _ in 0..MAX_ITERATIONS {
        let (sin_lambda, cos_lambda) = lambda.sin_cos();
        let sin_sigma = ((cos_u2 * sin_lambda).powi(2)
            + (cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda).powi(2))
        .sqrt();
        let cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;

        if sin_sigma <= f64::EPSILON {
            // Coincident points converge to zero; antipodal ones fall back.
            return (cos_sigma > 0.0).then_some(0.0);
        }

        let sigma = sin_sigma.atan2(cos_sigma);
        let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
        let cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
        // Equatorial geodesics have cos²α = 0.
        let cos_2sigma_m = if cos_sq_alpha.abs() > f64::EPSILON {
            cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
        } else {
            0.0
        };
        let correction =
            flattening / 16.0 * cos_sq_alpha * (4.0 + flattening * (4.0 - 3.0 * cos_sq_alpha));

        let previous = lambda;
        lambda = lon_delta
            + (1.0 - correction)
                * flattening
                * sin_alpha
                * (sigma
                    + correction
                        * sin_sigma
                        * (cos_2sigma_m
                            + correction * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))));

        if (lambda - previous).abs() < CONVERGENCE_RAD {
            let u_sq = cos_sq_alpha * (semi_major.powi(2) - semi_minor.powi(2)) / semi_minor.powi(2);
            let series_a =
                1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
            let series_b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
            let delta_sigma = series_b
                * sin_sigma
                * (cos_2sigma_m
                    + series_b / 4.0
                        * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))
                            - series_b / 6.0
                                * cos_2sigma_m
                                * (-3.0 + 4.0 * sin_sigma.powi(2))
                                * (-3.0 + 4.0 * cos_2sigma_m.powi(2))));
            return Some(semi_minor * series_a * (sigma - delta_sigma));
        }
    }

    None
}

/// Round a distance to two decimals.
fn round_km(distance: f64) -> f64 {
    (distance * 100.0).round() / 100.0
}

/// Select the facilities within `radius_km` of `origin`.
///
/// Inclusion compares the exact distance against the radius, so a facility
/// exactly on the boundary is included. Matches keep the input order and carry
/// their distance rounded to two decimals. A radius that is not strictly
/// positive matches nothing.
///
/// # Errors
///
/// Returns [`HygieiaError::MalformedRecord`] when a facility lacks `lat` or `lon`.
pub fn find_nearby(
    origin: &Coordinate,
    facilities: &[Facility],
    radius_km: f64,
) -> Result<Vec<NearbyFacility>, HygieiaError> {
    if radius_km.is_nan() || radius_km <= 0.0 {
        return Ok(Vec::new());
    }

    let mut nearby = Vec::new();
    for facility in facilities {
        let location = facility.location()?;
        let distance = geodesic_distance_km(origin, &location);
        if distance <= radius_km {
            nearby.push(NearbyFacility {
                facility: facility.clone(),
                distance: round_km(distance),
            });
        }
    }

    Ok(nearby)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::model::FacilityId;

    const BERLIN: Coordinate = Coordinate::new(52.5200, 13.4050);
    const PARIS: Coordinate = Coordinate::new(48.8566, 2.3522);

    fn facility(id: i64, lat: f64, lon: f64) -> Facility {
        Facility::new(FacilityId(id), Coordinate::new(lat, lon))
    }

    #[test]
    fn flinders_peak_to_buninyong() {
        // Vincenty's published test line, 54 972.271 m.
        let flinders = Coordinate::new(-37.951_033_417, 144.424_867_889);
        let buninyong = Coordinate::new(-37.652_821_139, 143.926_495_528);
        let distance = geodesic_distance_km(&flinders, &buninyong);
        assert!((distance - 54.972_271).abs() < 1e-3, "got {distance}");
    }

    #[test]
    fn berlin_to_paris() {
        let distance = geodesic_distance_km(&BERLIN, &PARIS);
        assert!((distance - 878.0).abs() < 5.0, "Berlin-Paris: {distance}");
    }

    #[test]
    fn same_point_is_zero() {
        assert!(geodesic_distance_km(&BERLIN, &BERLIN).abs() < 1e-9);
    }

    #[test]
    fn symmetric() {
        let there = geodesic_distance_km(&BERLIN, &PARIS);
        let back = geodesic_distance_km(&PARIS, &BERLIN);
        assert!((there - back).abs() < 1e-6);
    }

    #[test]
    fn antipodal_points_still_measure() {
        let distance = geodesic_distance_km(&Coordinate::new(0.0, 0.0), &Coordinate::new(0.0, 180.0));
        assert!(distance.is_finite());
        assert!((distance - 20_000.0).abs() < 30.0, "got {distance}");
    }

    #[test]
    fn filters_and_annotates_in_input_order() {
        let facilities = vec![
            facility(3, 10.01, 10.01),
            facility(1, 10.0, 10.0),
            facility(2, 11.0, 11.0),
        ];

        let nearby = find_nearby(&Coordinate::new(10.0, 10.0), &facilities, DEFAULT_RADIUS_KM).unwrap();

        let ids: Vec<_> = nearby.iter().map(|hit| hit.facility.id).collect();
        assert_eq!(ids, vec![FacilityId(3), FacilityId(1)]);
        assert!(nearby[0].distance > 1.5 && nearby[0].distance < 1.6);
        assert!(nearby[1].distance.abs() < f64::EPSILON);
    }

    #[test]
    fn leaves_input_untouched() {
        let facilities = vec![facility(1, 10.0, 10.0)];
        let before = facilities.clone();
        let _hits = find_nearby(&Coordinate::new(10.0, 10.0), &facilities, 5.0).unwrap();
        assert_eq!(facilities, before);
    }

    #[test]
    fn non_positive_radius_matches_nothing() {
        let facilities = vec![facility(1, 10.0, 10.0)];
        let origin = Coordinate::new(10.0, 10.0);
        assert!(find_nearby(&origin, &facilities, 0.0).unwrap().is_empty());
        assert!(find_nearby(&origin, &facilities, -1.0).unwrap().is_empty());
        assert!(find_nearby(&origin, &facilities, f64::NAN).unwrap().is_empty());
    }

    #[test]
    fn boundary_distance_is_included() {
        let origin = Coordinate::new(10.0, 10.0);
        let target = facility(9, 10.01, 10.0);
        let exact = geodesic_distance_km(&origin, &target.location().unwrap());

        let nearby = find_nearby(&origin, &[target], exact).unwrap();
        assert_eq!(nearby.len(), 1);
    }

    #[test]
    fn missing_coordinates_are_fatal() {
        let mut broken = facility(5, 0.0, 0.0);
        broken.lat = None;
        let result = find_nearby(&Coordinate::new(0.0, 0.0), &[facility(1, 0.0, 0.0), broken], 2.0);
        assert!(matches!(
            result,
            Err(HygieiaError::MalformedRecord { id: FacilityId(5), field: "lat" })
        ));
    }

    proptest! {
        #[test]
        fn inclusion_matches_distance(
            origin_lat in -60.0f64..60.0,
            origin_lon in -170.0f64..170.0,
            offsets in prop::collection::vec((-0.05f64..0.05, -0.05f64..0.05), 0..20),
            radius in 0.1f64..6.0,
        ) {
            let origin = Coordinate::new(origin_lat, origin_lon);
            let facilities: Vec<_> = offsets
                .iter()
                .zip(0_i64..)
                .map(|(&(dlat, dlon), id)| facility(id, origin_lat + dlat, origin_lon + dlon))
                .collect();

            let nearby = find_nearby(&origin, &facilities, radius).unwrap();
            let hit_ids: Vec<_> = nearby.iter().map(|hit| hit.facility.id).collect();

            for candidate in &facilities {
                let distance = geodesic_distance_km(&origin, &candidate.location().unwrap());
                prop_assert_eq!(hit_ids.contains(&candidate.id), distance <= radius);
            }
        }
    }
}
