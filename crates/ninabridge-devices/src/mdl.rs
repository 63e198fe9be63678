//! Device model definitions.
//!
//! Every NINA device the bridge understands is a [`DeviceKind`]; each kind
//! maps to one immutable [`DeviceDescriptor`] describing where its status
//! comes from and which named values it exposes.

use std::fmt;
use std::str::FromStr;

use ninabridge_core::{config_err, Error};

/// Home Assistant entity platform of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Sensor,
    BinarySensor,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sensor => "sensor",
            Self::BinarySensor => "binary_sensor",
        }
    }
}

/// One named value of interest in a device's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueDef {
    pub name: &'static str,
    pub display_name: Option<&'static str>,
    pub unit: Option<&'static str>,
    pub device_class: Option<&'static str>,
    pub state_class: Option<&'static str>,
    pub icon: Option<&'static str>,
    /// Source field names tried, in order, before `name` itself.
    pub aliases: &'static [&'static str],
    pub platform: Platform,
}

impl ValueDef {
    pub const fn sensor(name: &'static str, display_name: &'static str) -> Self {
        Self {
            name,
            display_name: Some(display_name),
            unit: None,
            device_class: None,
            state_class: None,
            icon: None,
            aliases: &[],
            platform: Platform::Sensor,
        }
    }

    pub const fn binary(name: &'static str, display_name: &'static str) -> Self {
        let mut def = Self::sensor(name, display_name);
        def.platform = Platform::BinarySensor;
        def
    }

    pub const fn unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }

    pub const fn class(mut self, device_class: &'static str) -> Self {
        self.device_class = Some(device_class);
        self
    }

    pub const fn measurement(mut self) -> Self {
        self.state_class = Some("measurement");
        self
    }

    pub const fn icon(mut self, icon: &'static str) -> Self {
        self.icon = Some(icon);
        self
    }

    pub const fn aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }
}

/// A list of sub-entries in a status response that is expanded into
/// synthesized values named `<prefix>_<index>_<field>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListSection {
    /// Field inside the response envelope holding the list.
    pub source: &'static str,
    pub prefix: &'static str,
    /// `(value suffix, source field)` pairs.
    pub fields: &'static [(&'static str, &'static str)],
    /// Icon used for the generic discovery entry of synthesized values.
    pub icon: &'static str,
}

/// How an image-producing kind obtains its bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    PreparedImage,
    Screenshot,
    Livestack,
}

/// Where a kind's status comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSource {
    /// A single JSON endpoint.
    Endpoint(&'static str),
    /// Composed from the version and application-start endpoints.
    Application,
    /// Binary image retrieval.
    Image(ImageSource),
}

/// Immutable per-kind metadata.
#[derive(Debug)]
pub struct DeviceDescriptor {
    pub kind: DeviceKind,
    pub source: StatusSource,
    pub values: &'static [ValueDef],
    pub lists: &'static [ListSection],
}

impl DeviceDescriptor {
    pub fn produces_image(&self) -> bool {
        matches!(self.source, StatusSource::Image(_))
    }

    pub fn value(&self, name: &str) -> Option<&'static ValueDef> {
        self.values.iter().find(|v| v.name == name)
    }
}

/// Supported NINA device kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceKind {
    Application,
    Camera,
    Mount,
    Dome,
    FilterWheel,
    FlatDevice,
    Focuser,
    Guider,
    Rotator,
    SafetyMonitor,
    Sequence,
    Switch,
    Weather,
    Livestack,
    MostRecentImage,
    Screenshot,
}

impl DeviceKind {
    pub const ALL: [DeviceKind; 16] = [
        Self::Application,
        Self::Camera,
        Self::Mount,
        Self::Dome,
        Self::FilterWheel,
        Self::FlatDevice,
        Self::Focuser,
        Self::Guider,
        Self::Rotator,
        Self::SafetyMonitor,
        Self::Sequence,
        Self::Switch,
        Self::Weather,
        Self::Livestack,
        Self::MostRecentImage,
        Self::Screenshot,
    ];

    /// Slug used in configuration and topics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::Camera => "camera",
            Self::Mount => "mount",
            Self::Dome => "dome",
            Self::FilterWheel => "filterwheel",
            Self::FlatDevice => "flatdevice",
            Self::Focuser => "focuser",
            Self::Guider => "guider",
            Self::Rotator => "rotator",
            Self::SafetyMonitor => "safetymonitor",
            Self::Sequence => "sequence",
            Self::Switch => "switch",
            Self::Weather => "weather",
            Self::Livestack => "livestack",
            Self::MostRecentImage => "most_recent_image",
            Self::Screenshot => "screenshot",
        }
    }

    pub fn descriptor(self) -> &'static DeviceDescriptor {
        match self {
            Self::Application => &APPLICATION,
            Self::Camera => &CAMERA,
            Self::Mount => &MOUNT,
            Self::Dome => &DOME,
            Self::FilterWheel => &FILTERWHEEL,
            Self::FlatDevice => &FLATDEVICE,
            Self::Focuser => &FOCUSER,
            Self::Guider => &GUIDER,
            Self::Rotator => &ROTATOR,
            Self::SafetyMonitor => &SAFETYMONITOR,
            Self::Sequence => &SEQUENCE,
            Self::Switch => &SWITCH,
            Self::Weather => &WEATHER,
            Self::Livestack => &LIVESTACK,
            Self::MostRecentImage => &MOST_RECENT_IMAGE,
            Self::Screenshot => &SCREENSHOT,
        }
    }

    pub fn produces_image(self) -> bool {
        self.descriptor().produces_image()
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| config_err!("Unknown device kind '{}'", s))
    }
}

/// "most_recent_image" -> "Most Recent Image"
pub fn title_case(slug: &str) -> String {
    slug.split(['_', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Descriptor tables
// ---------------------------------------------------------------------------

const fn connected(display_name: &'static str) -> ValueDef {
    ValueDef::binary("connected", display_name)
        .class("connectivity")
        .icon("mdi:lan-connect")
}

const fn temperature(name: &'static str, display_name: &'static str, icon: &'static str) -> ValueDef {
    ValueDef::sensor(name, display_name)
        .unit("°C")
        .class("temperature")
        .measurement()
        .icon(icon)
}

static APPLICATION: DeviceDescriptor = DeviceDescriptor {
    kind: DeviceKind::Application,
    source: StatusSource::Application,
    values: &[
        ValueDef::sensor("nina_version", "NINA Version").icon("mdi:alpha-n-box"),
        ValueDef::sensor("api_version", "API Version").icon("mdi:api"),
        ValueDef::sensor("application_start", "Application Start")
            .class("timestamp")
            .icon("mdi:clock-start"),
    ],
    lists: &[],
};

static CAMERA: DeviceDescriptor = DeviceDescriptor {
    kind: DeviceKind::Camera,
    source: StatusSource::Endpoint("/equipment/camera/info"),
    values: &[
        temperature("target_temp", "Target Temperature", "mdi:thermometer").aliases(&["TargetTemp"]),
        temperature("temperature", "Temperature", "mdi:thermometer"),
        ValueDef::sensor("gain", "Gain").measurement().icon("mdi:signal"),
        ValueDef::sensor("binx", "Bin X").unit("px").icon("mdi:grid"),
        ValueDef::sensor("biny", "Bin Y").unit("px").icon("mdi:grid"),
        ValueDef::sensor("bitdepth", "Bit Depth").unit("bit").icon("mdi:binary"),
        ValueDef::sensor("offset", "Offset").icon("mdi:arrow-collapse-horizontal"),
        ValueDef::binary("cooler_on", "Cooler On").icon("mdi:snowflake"),
        ValueDef::sensor("cooler_power", "Cooler Power")
            .unit("%")
            .measurement()
            .icon("mdi:gauge"),
        ValueDef::binary("dewheater_on", "Dew Heater On").icon("mdi:radiator"),
        ValueDef::binary("is_exposing", "Is Exposing").icon("mdi:camera-timer"),
        ValueDef::sensor("name", "Camera Name").icon("mdi:camera"),
        ValueDef::sensor("display_name", "Camera Display Name").icon("mdi:label"),
        connected("Camera Connected"),
    ],
    lists: &[],
};

static DOME: DeviceDescriptor = DeviceDescriptor {
    kind: DeviceKind::Dome,
    source: StatusSource::Endpoint("/equipment/dome/info"),
    values: &[
        ValueDef::sensor("shutter_status", "Shutter Status").icon("mdi:garage-open-variant"),
        ValueDef::binary("at_park", "At Park").icon("mdi:parking"),
        ValueDef::binary("at_home", "At Home").icon("mdi:home"),
        ValueDef::binary("driver_following", "Driver Following").icon("mdi:link-variant"),
        ValueDef::binary("slewing", "Slewing").icon("mdi:rotate-3d-variant"),
        ValueDef::sensor("azimuth", "Azimuth")
            .unit("°")
            .measurement()
            .icon("mdi:compass-outline"),
        connected("Dome Connected"),
        ValueDef::sensor("name", "Dome Name").icon("mdi:home-circle"),
        ValueDef::sensor("displayname", "Dome Display Name").icon("mdi:label"),
        ValueDef::binary("is_following", "Is Following").icon("mdi:orbit-variant"),
        ValueDef::binary("is_synchronized", "Is Synchronized").icon("mdi:sync"),
    ],
    lists: &[],
};

static FILTERWHEEL: DeviceDescriptor = DeviceDescriptor {
    kind: DeviceKind::FilterWheel,
    source: StatusSource::Endpoint("/equipment/filterwheel/info"),
    values: &[
        connected("Filter Wheel Connected"),
        ValueDef::sensor("name", "Filter Wheel Name").icon("mdi:filter-variant"),
        ValueDef::sensor("displayname", "Filter Wheel Display Name").icon("mdi:label"),
        ValueDef::sensor("description", "Filter Wheel Description").icon("mdi:text-box-outline"),
        ValueDef::binary("is_moving", "Filter Wheel Moving").icon("mdi:rotate-3d-variant"),
        ValueDef::sensor("selected_filter_name", "Selected Filter").icon("mdi:filter"),
        ValueDef::sensor("selected_filter_id", "Selected Filter Id")
            .measurement()
            .icon("mdi:filter"),
    ],
    lists: &[],
};

static FLATDEVICE: DeviceDescriptor = DeviceDescriptor {
    kind: DeviceKind::FlatDevice,
    source: StatusSource::Endpoint("/equipment/flatdevice/info"),
    values: &[
        ValueDef::sensor("cover_state", "Cover State").icon("mdi:window-shutter"),
        ValueDef::binary("light_on", "Light On").icon("mdi:lightbulb-on-outline"),
        ValueDef::sensor("brightness", "Brightness")
            .unit("%")
            .measurement()
            .icon("mdi:brightness-6"),
        connected("Flat Panel Connected"),
        ValueDef::sensor("name", "Flat Panel Name").icon("mdi:label"),
        ValueDef::sensor("displayname", "Flat Panel Display Name").icon("mdi:label-outline"),
    ],
    lists: &[],
};

static FOCUSER: DeviceDescriptor = DeviceDescriptor {
    kind: DeviceKind::Focuser,
    source: StatusSource::Endpoint("/equipment/focuser/info"),
    values: &[
        ValueDef::sensor("position", "Position")
            .unit("step")
            .measurement()
            .icon("mdi:arrow-expand-vertical"),
        temperature("temperature", "Temperature", "mdi:thermometer"),
        ValueDef::binary("is_moving", "Is Moving").icon("mdi:swap-vertical"),
        ValueDef::binary("is_settling", "Is Settling").icon("mdi:progress-clock"),
        ValueDef::binary("temp_comp", "Temperature Compensation").icon("mdi:thermometer-auto"),
        connected("Focuser Connected"),
        ValueDef::sensor("name", "Focuser Name").icon("mdi:label"),
        ValueDef::sensor("displayname", "Focuser Display Name").icon("mdi:label-outline"),
    ],
    lists: &[],
};

const fn rms(name: &'static str, display_name: &'static str, unit: &'static str) -> ValueDef {
    ValueDef::sensor(name, display_name)
        .unit(unit)
        .measurement()
        .icon("mdi:chart-line")
}

static GUIDER: DeviceDescriptor = DeviceDescriptor {
    kind: DeviceKind::Guider,
    source: StatusSource::Endpoint("/equipment/guider/info"),
    values: &[
        connected("Guider Connected"),
        ValueDef::sensor("name", "Guider Name").icon("mdi:telescope"),
        ValueDef::sensor("displayname", "Guider Display Name").icon("mdi:label"),
        rms("rmserror_ra_pixels", "RMS Error RA (px)", "px"),
        rms("rmserror_ra_arcsec", "RMS Error RA (arcsec)", "arcsec"),
        rms("rmserror_dec_pixels", "RMS Error Dec (px)", "px"),
        rms("rmserror_dec_arcsec", "RMS Error Dec (arcsec)", "arcsec"),
        rms("rmserror_total_pixels", "RMS Error Total (px)", "px"),
        rms("rmserror_total_arcsec", "RMS Error Total (arcsec)", "arcsec"),
        rms("rmserror_peak_ra_pixels", "Peak RA Error (px)", "px"),
        rms("rmserror_peak_ra_arcsec", "Peak RA Error (arcsec)", "arcsec"),
        rms("rmserror_peak_dec_pixels", "Peak Dec Error (px)", "px"),
        rms("rmserror_peak_dec_arcsec", "Peak Dec Error (arcsec)", "arcsec"),
        ValueDef::sensor("state", "Guider State").icon("mdi:play-circle"),
    ],
    lists: &[],
};

static MOUNT: DeviceDescriptor = DeviceDescriptor {
    kind: DeviceKind::Mount,
    source: StatusSource::Endpoint("/equipment/mount/info"),
    values: &[
        ValueDef::sensor("tracking_mode", "Tracking Mode").icon("mdi:orbit-variant"),
        ValueDef::sensor("sidereal_time", "Sidereal Time")
            .unit("h")
            .measurement()
            .icon("mdi:clock-outline"),
        ValueDef::sensor("right_ascension", "Right Ascension")
            .unit("h")
            .measurement()
            .icon("mdi:alpha-r-circle"),
        ValueDef::sensor("declination", "Declination")
            .unit("°")
            .measurement()
            .icon("mdi:alpha-d-circle"),
        ValueDef::sensor("site_latitude", "Site Latitude")
            .unit("°")
            .measurement()
            .icon("mdi:earth"),
        ValueDef::sensor("site_longitude", "Site Longitude")
            .unit("°")
            .measurement()
            .icon("mdi:earth"),
        ValueDef::sensor("site_elevation", "Site Elevation")
            .unit("m")
            .measurement()
            .icon("mdi:image-filter-hdr"),
        ValueDef::sensor("right_ascension_string", "RA String").icon("mdi:alpha-r-box"),
        ValueDef::sensor("declination_string", "Dec String").icon("mdi:alpha-d-box"),
        ValueDef::sensor("time_to_flip", "Time To Flip")
            .unit("min")
            .measurement()
            .icon("mdi:timer-sand")
            .aliases(&["TimeToMeridianFlip"]),
        ValueDef::sensor("side_of_pier", "Side of Pier").icon("mdi:swap-horizontal-bold"),
        ValueDef::sensor("altitude", "Altitude")
            .unit("°")
            .measurement()
            .icon("mdi:altimeter"),
        ValueDef::sensor("azimuth", "Azimuth")
            .unit("°")
            .measurement()
            .icon("mdi:compass-outline"),
        ValueDef::sensor("sidereal_time_string", "Sidereal Time String").icon("mdi:clock-outline"),
        ValueDef::sensor("hours_to_meridian", "Hours To Meridian")
            .icon("mdi:timer-outline")
            .aliases(&["HoursToMeridianString"]),
        ValueDef::binary("at_park", "At Park").icon("mdi:parking"),
        ValueDef::binary("at_home", "At Home").icon("mdi:home"),
        ValueDef::binary("tracking_enabled", "Tracking Enabled").icon("mdi:orbit"),
        ValueDef::binary("slewing", "Mount Slewing").icon("mdi:rotate-3d-variant"),
        ValueDef::sensor("time_to_flip_string", "Time To Flip String")
            .icon("mdi:timer-outline")
            .aliases(&["TimeToMeridianFlipString"]),
        ValueDef::binary("is_pulse_guiding", "Pulse Guiding")
            .icon("mdi:cursor-default-click-outline"),
        connected("Mount Connected"),
        ValueDef::sensor("utc_date", "UTC Date")
            .class("timestamp")
            .icon("mdi:calendar-clock"),
        ValueDef::sensor("name", "Mount Name").icon("mdi:telescope"),
        ValueDef::sensor("displayname", "Mount Display Name").icon("mdi:label"),
    ],
    lists: &[],
};

static ROTATOR: DeviceDescriptor = DeviceDescriptor {
    kind: DeviceKind::Rotator,
    source: StatusSource::Endpoint("/equipment/rotator/info"),
    values: &[
        ValueDef::sensor("mechanical_position", "Mechanical Position")
            .unit("°")
            .measurement()
            .icon("mdi:rotate-3d"),
        ValueDef::sensor("position", "Position")
            .unit("°")
            .measurement()
            .icon("mdi:rotate-orbit"),
        ValueDef::binary("is_moving", "Is Moving").icon("mdi:rotate-right"),
        connected("Rotator Connected"),
        ValueDef::sensor("name", "Rotator Name").icon("mdi:label"),
        ValueDef::sensor("displayname", "Rotator Display Name").icon("mdi:label-outline"),
    ],
    lists: &[],
};

static SAFETYMONITOR: DeviceDescriptor = DeviceDescriptor {
    kind: DeviceKind::SafetyMonitor,
    source: StatusSource::Endpoint("/equipment/safetymonitor/info"),
    values: &[
        ValueDef::binary("is_safe", "Is Safe")
            .class("safety")
            .icon("mdi:shield-check"),
        connected("Safety Monitor Connected"),
        ValueDef::sensor("name", "Safety Monitor Name").icon("mdi:shield"),
        ValueDef::sensor("displayname", "Safety Monitor Display Name").icon("mdi:label"),
    ],
    lists: &[],
};

static SEQUENCE: DeviceDescriptor = DeviceDescriptor {
    kind: DeviceKind::Sequence,
    source: StatusSource::Endpoint("/sequence/json"),
    values: &[
        ValueDef::sensor("status", "Sequence Status").icon("mdi:script-text"),
        ValueDef::sensor("name", "Sequence Name").icon("mdi:label"),
    ],
    lists: &[],
};

static SWITCH: DeviceDescriptor = DeviceDescriptor {
    kind: DeviceKind::Switch,
    source: StatusSource::Endpoint("/equipment/switch/info"),
    values: &[
        connected("Switch Connected"),
        ValueDef::sensor("name", "Switch Name").icon("mdi:toggle-switch"),
        ValueDef::sensor("displayname", "Switch Display Name").icon("mdi:label"),
    ],
    lists: &[
        ListSection {
            source: "ReadonlySwitches",
            prefix: "readonly_switch",
            fields: &[
                ("name", "Name"),
                ("value", "Value"),
                ("id", "Id"),
                ("description", "Description"),
            ],
            icon: "mdi:toggle-switch",
        },
        ListSection {
            source: "WriteableSwitches",
            prefix: "writable_switch",
            fields: &[
                ("name", "Name"),
                ("id", "Id"),
                ("min", "Min"),
                ("max", "Max"),
                ("description", "Description"),
                ("stepsize", "StepSize"),
                ("targetvalue", "TargetValue"),
            ],
            icon: "mdi:toggle-switch",
        },
    ],
};

static WEATHER: DeviceDescriptor = DeviceDescriptor {
    kind: DeviceKind::Weather,
    source: StatusSource::Endpoint("/equipment/weather/info"),
    values: &[
        ValueDef::sensor("cloudcover", "Cloud Cover")
            .unit("%")
            .measurement()
            .icon("mdi:weather-cloudy"),
        ValueDef::sensor("averageperiod", "Average Period")
            .unit("s")
            .measurement()
            .icon("mdi:timer-outline"),
        temperature("dewpoint", "Dew Point", "mdi:thermometer-water"),
        ValueDef::sensor("humidity", "Humidity")
            .unit("%")
            .class("humidity")
            .measurement()
            .icon("mdi:water-percent"),
        ValueDef::sensor("pressure", "Pressure")
            .unit("hPa")
            .class("pressure")
            .measurement()
            .icon("mdi:gauge"),
        ValueDef::sensor("rain_rate", "Rain Rate").icon("mdi:weather-pouring"),
        ValueDef::sensor("sky_brightness", "Sky Brightness").icon("mdi:weather-night"),
        ValueDef::sensor("sky_quality", "Sky Quality").icon("mdi:weather-night-partly-cloudy"),
        temperature("sky_temperature", "Sky Temperature", "mdi:thermometer-chevron-down"),
        ValueDef::sensor("star_fwhm", "Star FWHM")
            .unit("arcsec")
            .measurement()
            .icon("mdi:chart-bell-curve"),
        temperature("temperature", "Temperature", "mdi:thermometer"),
        ValueDef::sensor("wind_direction", "Wind Direction")
            .unit("°")
            .measurement()
            .icon("mdi:compass"),
        ValueDef::sensor("wind_gust", "Wind Gust").icon("mdi:weather-windy"),
        ValueDef::sensor("wind_speed", "Wind Speed")
            .unit("m/s")
            .measurement()
            .icon("mdi:weather-windy"),
        connected("Weather Connected"),
        ValueDef::sensor("name", "Weather Name").icon("mdi:label"),
        ValueDef::sensor("displayname", "Weather Display Name").icon("mdi:label-outline"),
    ],
    lists: &[],
};

static LIVESTACK: DeviceDescriptor = DeviceDescriptor {
    kind: DeviceKind::Livestack,
    source: StatusSource::Image(ImageSource::Livestack),
    values: &[],
    lists: &[],
};

static MOST_RECENT_IMAGE: DeviceDescriptor = DeviceDescriptor {
    kind: DeviceKind::MostRecentImage,
    source: StatusSource::Image(ImageSource::PreparedImage),
    values: &[],
    lists: &[],
};

static SCREENSHOT: DeviceDescriptor = DeviceDescriptor {
    kind: DeviceKind::Screenshot,
    source: StatusSource::Image(ImageSource::Screenshot),
    values: &[],
    lists: &[],
};
