use std::path::PathBuf;

use clap::Parser;
use tileforge_tile_utils::TileId;

/// Builds and serves vector tiles from an OSM feature extract.
#[derive(Parser, Debug, PartialEq)]
#[command(about, version)]
pub struct Args {
    /// TCP port to listen on
    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// Number of tile builder threads [default: CPU cores - 1]
    #[arg(long)]
    pub threads: Option<usize>,

    /// SQLite file storing generated tiles
    #[arg(long, default_value = "planet.mbtiles")]
    pub db: PathBuf,

    /// SQLite file holding the search index
    #[arg(long, default_value = "search.sqlite")]
    pub ftsdb: PathBuf,

    /// Shared secret enabling the X-Rebuild-Tile header
    #[arg(long)]
    pub admin_key: Option<String>,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    pub log: Option<PathBuf>,

    /// Build tile z/x/y and all children down to --maxz, then exit
    #[arg(long, value_name = "z/x/y", value_parser = parse_tile_id)]
    pub build: Option<TileId>,

    /// Maximum tile zoom level
    #[arg(long, default_value_t = 14)]
    pub maxz: u8,

    /// Build the search index, then exit
    #[arg(long)]
    pub buildfts: bool,

    /// World features (GeoJSON FeatureCollection with OSM tags)
    pub world: PathBuf,

    /// Ocean polygons (GeoJSON FeatureCollection)
    pub ocean: PathBuf,
}

impl Args {
    /// Worker pool size: explicit `--threads`, else `max(2, cores) - 1`.
    #[must_use]
    pub fn worker_threads(&self) -> usize {
        self.threads.unwrap_or_else(|| {
            let cores = std::thread::available_parallelism().map_or(2, usize::from);
            cores.max(2) - 1
        })
    }
}

fn parse_tile_id(value: &str) -> Result<TileId, String> {
    let parts: Vec<&str> = value.split('/').collect();
    let [z, x, y] = parts.as_slice() else {
        return Err(format!("expected WMTS z/x/y, got {value}"));
    };
    let z: u8 = z.parse().map_err(|_| format!("invalid zoom {z}"))?;
    let x: i32 = x.parse().map_err(|_| format!("invalid column {x}"))?;
    let y: i32 = y.parse().map_err(|_| format!("invalid row {y}"))?;
    let id = TileId::new(x, y, z);
    if !id.is_valid() {
        return Err(format!("tile id {value} is invalid (expected WMTS z/x/y)"));
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let args = Args::parse_from(["tileforge", "world.geojson", "ocean.geojson"]);
        assert_eq!(args.port, 8080);
        assert_eq!(args.maxz, 14);
        assert_eq!(args.world, PathBuf::from("world.geojson"));
        assert!(args.build.is_none());
        assert!(args.worker_threads() >= 1);
    }

    #[test]
    fn test_parse_build_tile() {
        let args = Args::parse_from([
            "tileforge",
            "--build",
            "10/163/395",
            "--maxz",
            "12",
            "world.geojson",
            "ocean.geojson",
        ]);
        assert_eq!(args.build, Some(TileId::new(163, 395, 10)));
        assert_eq!(args.maxz, 12);
    }

    #[test]
    fn test_parse_rejects_bad_tile() {
        assert!(Args::try_parse_from([
            "tileforge",
            "--build",
            "3/17/1",
            "world.geojson",
            "ocean.geojson",
        ])
        .is_err());
        assert!(Args::try_parse_from([
            "tileforge",
            "--build",
            "abc",
            "world.geojson",
            "ocean.geojson",
        ])
        .is_err());
    }
}
