//! Interactive map rendering
//!
//! Turns a [`Report`] into markers: one for the origin and one circle per city,
//! coloured by transit/driving ratio on a green-yellow-red scale and sized by
//! how favourable transit is relative to the other cities. The result can be
//! exported as GeoJSON or as a standalone Leaflet page.

use askama::Template;
use serde::Serialize;
use serde_json::{Value, json};

use crate::Result;
use crate::models::{GeoPoint, Origin};
use crate::report::{Report, ReportRow, format_duration, format_km};

/// Colour stops of the ratio scale: (ratio, rgb)
const RATIO_SCALE: [(f64, [u8; 3]); 3] = [
    (0.5, [0x00, 0x80, 0x00]),
    (1.0, [0xff, 0xff, 0x00]),
    (1.5, [0xff, 0x00, 0x00]),
];

/// Colour for cities without a transit route
const NO_RATIO_COLOR: &str = "#808080";
const MIN_RADIUS: f64 = 5.0;
const RADIUS_RANGE: f64 = 25.0;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    Origin,
    City,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Marker {
    pub kind: MarkerKind,
    pub position: GeoPoint,
    pub label: String,
    /// HTML shown when the marker is clicked
    pub popup: String,
    pub color: String,
    /// Circle radius in pixels
    pub radius: u32,
    pub ratio: Option<f64>,
}

/// A renderable map: centre, zoom and markers (origin first)
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MapView {
    pub center: GeoPoint,
    pub zoom: u8,
    pub markers: Vec<Marker>,
}

#[derive(Template)]
#[template(source = "{{ address }}", ext = "html")]
struct OriginPopup<'a> {
    address: &'a str,
}

#[derive(Template)]
#[template(path = "city_popup.html")]
struct CityPopup<'a> {
    city: &'a str,
    ratio: String,
    duration_driving: String,
    duration_transit: String,
    distance_km: String,
}

#[derive(Template)]
#[template(path = "map.html")]
struct MapPage {
    title: String,
    /// GeoJSON, already safe to embed in a script element
    data: String,
    lat: f64,
    lon: f64,
    zoom: u8,
}

pub struct MapRenderer;

impl MapRenderer {
    /// Build the map for `report`, centred on `center`
    pub fn render(origin: &Origin, center: GeoPoint, zoom: u8, report: &Report) -> Result<MapView> {
        let mut markers = Vec::with_capacity(report.rows.len() + 1);
        markers.push(Marker {
            kind: MarkerKind::Origin,
            position: origin.point,
            label: origin.address.clone(),
            popup: OriginPopup {
                address: &origin.address,
            }
            .render()?,
            color: "#000000".to_string(),
            radius: 0,
            ratio: None,
        });

        let inverse: Vec<f64> = report
            .rows
            .iter()
            .filter_map(|r| r.ratio)
            .filter(|r| *r > 0.0)
            .map(|r| 1.0 / r)
            .collect();
        let min = inverse.iter().copied().fold(f64::INFINITY, f64::min);
        let max = inverse.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        for row in &report.rows {
            let (color, radius) = match row.ratio {
                Some(ratio) if ratio > 0.0 => {
                    let scaled = if max > min {
                        (1.0 / ratio - min) / (max - min)
                    } else {
                        1.0
                    };
                    (
                        ratio_color(ratio),
                        (RADIUS_RANGE * scaled + MIN_RADIUS).round() as u32,
                    )
                }
                _ => (NO_RATIO_COLOR.to_string(), MIN_RADIUS as u32),
            };

            markers.push(Marker {
                kind: MarkerKind::City,
                position: row.city.point(),
                label: row.city.name.clone(),
                popup: city_popup(row)?,
                color,
                radius,
                ratio: row.ratio,
            });
        }

        Ok(MapView {
            center,
            zoom,
            markers,
        })
    }
}

impl MapView {
    /// Number of city markers
    #[must_use]
    pub fn city_count(&self) -> usize {
        self.markers
            .iter()
            .filter(|m| m.kind == MarkerKind::City)
            .count()
    }

    /// GeoJSON FeatureCollection with one Point feature per marker
    #[must_use]
    pub fn to_geojson(&self) -> Value {
        let features: Vec<Value> = self
            .markers
            .iter()
            .map(|m| {
                json!({
                    "type": "Feature",
                    "geometry": {
                        "type": "Point",
                        "coordinates": [m.position.longitude, m.position.latitude],
                    },
                    "properties": {
                        "kind": m.kind,
                        "name": m.label,
                        "popup": m.popup,
                        "color": m.color,
                        "radius": m.radius,
                        "ratio": m.ratio,
                    },
                })
            })
            .collect();

        json!({
            "type": "FeatureCollection",
            "features": features,
        })
    }

    /// Standalone HTML page drawing the markers with Leaflet
    pub fn to_html(&self) -> Result<String> {
        let title = self
            .markers
            .iter()
            .find(|m| m.kind == MarkerKind::Origin)
            .map_or_else(
                || "Transit ratio".to_string(),
                |m| format!("Transit ratio from {}", m.label),
            );

        let page = MapPage {
            title,
            // keep "</script>" inside popups from closing the script element
            data: self.to_geojson().to_string().replace("</", "<\\/"),
            lat: self.center.latitude,
            lon: self.center.longitude,
            zoom: self.zoom,
        };
        Ok(page.render()?)
    }
}

/// Colour of `ratio` on the green (0.5) - yellow (1.0) - red (1.5) scale, clamped
#[must_use]
pub fn ratio_color(ratio: f64) -> String {
    let (first, last) = (RATIO_SCALE[0], RATIO_SCALE[RATIO_SCALE.len() - 1]);
    let ratio = ratio.clamp(first.0, last.0);

    let rgb = RATIO_SCALE
        .windows(2)
        .find(|w| ratio <= w[1].0)
        .map_or(last.1, |w| {
            let (lo, hi) = (w[0], w[1]);
            let t = (ratio - lo.0) / (hi.0 - lo.0);
            let mut rgb = [0u8; 3];
            for (i, c) in rgb.iter_mut().enumerate() {
                let (a, b) = (f64::from(lo.1[i]), f64::from(hi.1[i]));
                *c = (a + (b - a) * t).round() as u8;
            }
            rgb
        });

    format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2])
}

fn city_popup(row: &ReportRow) -> Result<String> {
    let popup = CityPopup {
        city: &row.city.name,
        ratio: row.ratio.map_or_else(|| "-".to_string(), |r| format!("{r:.2}")),
        duration_driving: format_duration(row.driving.duration_s),
        duration_transit: row
            .transit
            .as_ref()
            .map_or_else(|| "-".to_string(), |t| format_duration(t.duration_s)),
        distance_km: format_km(row.driving.distance_m),
    };
    Ok(popup.render()?)
}
