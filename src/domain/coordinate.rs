const EARTH_RADIUS_MILES: f64 = 3958.8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    /// Great-circle distance in miles (haversine).
    pub fn distance_miles(&self, other: &Coordinate) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlat = (other.lat - self.lat).to_radians();
        let dlng = (other.lng - self.lng).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_MILES * a.sqrt().asin()
    }
}

#[cfg(test)]
mod tests {
    use super::Coordinate;

    #[test]
    fn distance_to_self_is_zero() {
        let austin = Coordinate {
            lat: 30.2672,
            lng: -97.7431,
        };
        assert_eq!(austin.distance_miles(&austin), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let austin = Coordinate {
            lat: 30.2672,
            lng: -97.7431,
        };
        let round_rock = Coordinate {
            lat: 30.5083,
            lng: -97.6789,
        };
        assert_eq!(
            austin.distance_miles(&round_rock),
            round_rock.distance_miles(&austin)
        );
    }

    #[test]
    fn austin_to_dallas_is_roughly_180_miles() {
        let austin = Coordinate {
            lat: 30.2672,
            lng: -97.7431,
        };
        let dallas = Coordinate {
            lat: 32.7767,
            lng: -96.7970,
        };
        let distance = austin.distance_miles(&dallas);
        assert!((175.0..195.0).contains(&distance), "got {}", distance);
    }
}
