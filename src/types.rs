#[derive(Debug, PartialEq, Eq, Clone, Hash, PartialOrd, Ord)]
pub struct VehicleId(String);

impl VehicleId {
    pub const MAX_LENGTH: usize = 140;

    pub fn new(value: &str) -> Result<Self, VehicleIdError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(VehicleIdError::Empty);
        }
        if trimmed.len() > Self::MAX_LENGTH {
            return Err(VehicleIdError::TooLong(trimmed.len()));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(VehicleIdError::ContainsWhitespace(trimmed.to_string()));
        }
        Ok(VehicleId(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VehicleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for VehicleId {
    type Err = VehicleIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VehicleId::new(s)
    }
}

#[derive(Debug, PartialEq)]
pub enum VehicleIdError {
    Empty,
    TooLong(usize),
    ContainsWhitespace(String),
}
impl std::fmt::Display for VehicleIdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VehicleIdError::Empty => write!(f, "Vehicle id is empty"),
            VehicleIdError::TooLong(length) => write!(
                f,
                "Vehicle id has {length} characters, limit is {}",
                VehicleId::MAX_LENGTH
            ),
            VehicleIdError::ContainsWhitespace(value) => {
                write!(f, "Vehicle id '{value}' contains whitespace")
            }
        }
    }
}
impl std::error::Error for VehicleIdError {}

#[derive(Debug, PartialEq, Clone, Copy, serde::Deserialize, serde::Serialize)]
pub struct LatLng {
    #[serde(deserialize_with = "crate::types::deserialize_coordinate")]
    pub lat: f64,
    #[serde(deserialize_with = "crate::types::deserialize_coordinate")]
    pub lng: f64,
}

impl LatLng {
    #[must_use]
    pub fn new(lat: f64, lng: f64) -> Self {
        LatLng { lat, lng }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

impl std::fmt::Display for LatLng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.5}, {:.5})", self.lat, self.lng)
    }
}

/// Axis-aligned box around a set of coordinates.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Bounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl Bounds {
    /// Returns `None` for an empty sequence.
    pub fn enclosing<'a>(points: impl IntoIterator<Item = &'a LatLng>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = *points.next()?;
        let mut bounds = Bounds {
            south_west: first,
            north_east: first,
        };
        for point in points {
            bounds.south_west.lat = bounds.south_west.lat.min(point.lat);
            bounds.south_west.lng = bounds.south_west.lng.min(point.lng);
            bounds.north_east.lat = bounds.north_east.lat.max(point.lat);
            bounds.north_east.lng = bounds.north_east.lng.max(point.lng);
        }
        Some(bounds)
    }

    #[must_use]
    pub fn center(&self) -> LatLng {
        LatLng::new(
            f64::midpoint(self.south_west.lat, self.north_east.lat),
            f64::midpoint(self.south_west.lng, self.north_east.lng),
        )
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub struct VehiclePosition {
    pub coordinates: LatLng,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Accepts a coordinate either as a JSON number or as a numeric string,
/// since the backend serializes decimal fields both ways.
pub fn deserialize_coordinate<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        String(String),
    }

    match <NumberOrString as serde::Deserialize>::deserialize(deserializer)? {
        NumberOrString::Number(value) => Ok(value),
        NumberOrString::String(string) => string
            .trim()
            .parse::<f64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid coordinate '{string}': {e}"))),
    }
}

/// Document names arrive as strings, numeric autoname ids as numbers.
pub fn deserialize_identifier<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match <serde_json::Value as serde::Deserialize>::deserialize(deserializer)? {
        serde_json::Value::String(string) => Ok(string),
        serde_json::Value::Number(number) => Ok(number.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected identifier, found {other}"
        ))),
    }
}

/// Parses the timestamp formats the backend emits: RFC 3339, or the
/// framework's naive `YYYY-MM-DD HH:MM:SS[.ffffff]` which is taken as UTC.
#[must_use]
pub fn parse_backend_timestamp(string: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    let string = string.trim();
    if let Ok(datetime) = chrono::DateTime::parse_from_rfc3339(string) {
        return Some(datetime.with_timezone(&chrono::Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| chrono::NaiveDateTime::parse_from_str(string, format).ok())
        .map(|naive| naive.and_utc())
}
