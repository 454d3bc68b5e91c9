use std::{io, path::Path};

use log::{info, warn};
use region_annotator::{storage::file, AnnotationStore, Config};

fn main() -> io::Result<()> {
    env_logger::init();

    let config: Config = match std::fs::File::open("config.json") {
        Ok(f) => serde_json::from_reader(f).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Config::default(),
        Err(e) => return Err(e),
    };
    info!("Run with config: {config:?}");

    let Some(project_path) = std::env::args().nth(1) else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Usage: region-annotator-app <project.json>",
        ));
    };

    let project = file::load(&project_path)?;
    info!(
        "Project '{}' on {} ({} blobs)",
        project.project_name,
        project.map_file,
        project.segmentation_data.len()
    );

    let map_path = Path::new(&project_path)
        .parent()
        .unwrap_or(Path::new("."))
        .join(&project.map_file);
    match std::fs::read(&map_path) {
        Ok(bytes) => {
            let map = region_annotator::image_utils::load_image(&bytes)?;
            info!("Map {map_path:?} is {}x{}", map.width(), map.height());
        }
        Err(e) => warn!("Couldn't read map {map_path:?}: {e}"),
    }

    let scale = project.map_px_to_mm_factor;
    let store = AnnotationStore::from_records(project.segmentation_data)?;
    for blob in store.iter() {
        println!(
            "{:>6} {:<20} area {:>10.1} perimeter {:>8.1} group {}",
            blob.id(),
            blob.class_name(),
            blob.area() * scale * scale,
            blob.perimeter() * scale,
            blob.group().map_or("-".to_string(), |g| g.0.to_string()),
        );
    }
    let groups = store.groups().count();
    info!("{} blobs in {groups} groups", store.len());
    Ok(())
}
