use gdal::spatial_ref::SpatialRef;

pub type EpsgCode = u32;

/// WGS84 longitude/latitude, the reference system of every geometry written by the API.
pub const WGS84: EpsgCode = 4326;

pub fn epsg_4326() -> gdal::errors::Result<SpatialRef> {
    SpatialRef::from_epsg(WGS84)
}

pub fn epsg_code_to_authority_string(code: EpsgCode) -> String {
    format!("EPSG:{}", code)
}
