//! Tile backends the map widget can switch between.
//!
//! Each backend serves tiles in one reference system. That system becomes
//! the working system for marker placement while the backend is active.

use crate::model::CoordSystem;

pub struct Basemap {
    pub id: &'static str,
    pub name: &'static str,
    pub coord_system: CoordSystem,
    /// Leaflet-style template with `{s}`, `{x}`, `{y}`, `{z}` placeholders.
    pub tile_url: &'static str,
    pub subdomains: &'static [&'static str],
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub attribution: &'static str,
}

impl Basemap {
    /// Expands the template for one tile. The subdomain rotates with x + y.
    pub fn tile_url_for(&self, x: u32, y: u32, z: u8) -> String {
        let sub = if self.subdomains.is_empty() {
            ""
        } else {
            self.subdomains[((x as usize) + (y as usize)) % self.subdomains.len()]
        };
        self.tile_url
            .replace("{s}", sub)
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
            .replace("{z}", &z.to_string())
    }
}

pub static BASEMAP_REGISTRY: &[Basemap] = &[
    Basemap {
        id: "osm",
        name: "OpenStreetMap",
        coord_system: CoordSystem::Wgs84,
        tile_url: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png",
        subdomains: &["a", "b", "c"],
        min_zoom: 0,
        max_zoom: 19,
        attribution: "© OpenStreetMap contributors",
    },
    Basemap {
        id: "gaode",
        name: "Gaode",
        coord_system: CoordSystem::Gcj02,
        tile_url: "http://webrd0{s}.is.autonavi.com/appmaptile?lang=zh_cn&size=1&scale=1&style=8&x={x}&y={y}&z={z}",
        subdomains: &["1", "2", "3", "4"],
        min_zoom: 1,
        max_zoom: 19,
        attribution: "© Gaode",
    },
    Basemap {
        id: "baidu",
        name: "Baidu",
        coord_system: CoordSystem::Bd09,
        tile_url: "http://api{s}.map.bdimg.com/customimage/tile?&x={x}&y={y}&z={z}&udt=20160928&scale=1",
        subdomains: &["0", "1", "2"],
        min_zoom: 3,
        max_zoom: 19,
        attribution: "© Baidu",
    },
];

pub const DEFAULT_BASEMAP: &str = "gaode";

pub fn find_basemap(id: &str) -> Option<&'static Basemap> {
    let id = id.trim().to_ascii_lowercase();
    BASEMAP_REGISTRY.iter().find(|b| b.id == id)
}

pub fn default_basemap() -> &'static Basemap {
    find_basemap(DEFAULT_BASEMAP).unwrap_or(&BASEMAP_REGISTRY[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_system_has_a_backend() {
        for system in CoordSystem::ALL {
            assert!(
                BASEMAP_REGISTRY.iter().any(|b| b.coord_system == system),
                "no basemap serves {}",
                system
            );
        }
    }

    #[test]
    fn test_zoom_ranges_are_sane() {
        for b in BASEMAP_REGISTRY {
            assert!(b.min_zoom < b.max_zoom, "{}", b.id);
        }
    }

    #[test]
    fn test_default_is_gaode_in_gcj02() {
        let b = default_basemap();
        assert_eq!(b.id, "gaode");
        assert_eq!(b.coord_system, CoordSystem::Gcj02);
    }

    #[test]
    fn test_find_is_case_insensitive() {
        assert_eq!(find_basemap("OSM").map(|b| b.id), Some("osm"));
        assert!(find_basemap("bing").is_none());
    }

    #[test]
    fn test_tile_url_expansion() {
        let osm = find_basemap("osm").expect("osm registered");
        assert_eq!(
            osm.tile_url_for(1, 1, 3),
            "https://c.tile.openstreetmap.org/3/1/1.png"
        );
    }
}
