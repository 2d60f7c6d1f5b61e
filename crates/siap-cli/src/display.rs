//! Vertical card display for visit records and school lists.
//!
//! Renders a [`SchoolVisit`] as grouped, human-readable sections. Image
//! fields are summarized by MIME type and size rather than printed.

use siap_core::{GeofenceResult, ImageArtifact, School, SchoolVisit};

const MAX_LIST_ITEMS: usize = 10;

// ── Public API ──

/// Print a single visit as a vertical card grouped by section.
pub fn print_visit_card(visit: &SchoolVisit) {
    println!("=== {} ===", visit.id);
    println!("{}", visit.school_name);
    println!();

    println!("Kunjungan");
    field("date", &visit.date);
    field("jam", &visit.jam);
    field("inspector", &visit.inspector_id);
    field("principal", &visit.principal_name);
    field("type", visit.supervision_type.as_str());
    field("status", &format!("{:?}", visit.status));
    println!();

    println!("Lokasi");
    if let Some(location) = &visit.location {
        field("captured", &location.to_string());
        if let Some(acc) = location.accuracy() {
            field("accuracy", &format!("{acc:.0} m"));
        }
    }
    field("verified", if visit.location_verified { "yes" } else { "no" });
    field("distance", &format!("{} m", visit.distance_meter));
    field("label", &visit.location_status);
    println!();

    println!("Instrumen");
    field("notes", &visit.notes);
    let m = &visit.empathy_metrics;
    field(
        "empathy",
        &format!(
            "climate {}  engagement {}  leadership {}",
            m.school_climate, m.teacher_engagement, m.leadership_vibe
        ),
    );
    println!();

    print_list("Temuan", &visit.key_findings);
    print_list("Tindak lanjut", &visit.agreed_actions);

    println!("Pengesahan");
    field("photo", &artifact_summary(&visit.photo));
    field("supervisor", &artifact_summary(&visit.signature_supervisor));
    field("principal", &artifact_summary(&visit.signature_principal));
    if let Some(link) = &visit.link_pdf {
        field("pdf", link);
    }
}

/// One line per visit, newest first as stored.
pub fn print_visit_table(visits: &[SchoolVisit]) {
    if visits.is_empty() {
        println!("(no visits)");
        return;
    }
    for v in visits {
        println!(
            "  {:<10} {:<10} {:>5}  {:<28} {:<18} {}",
            v.id,
            v.date,
            v.jam,
            truncate(&v.school_name, 28),
            v.supervision_type.as_str(),
            v.location_status,
        );
    }
}

pub fn print_school_table(schools: &[&School]) {
    if schools.is_empty() {
        println!("(no schools)");
        return;
    }
    for s in schools {
        let coordinate = match s.registered_coordinate() {
            Some(c) => c.to_string(),
            None => "(no coordinate)".to_string(),
        };
        println!(
            "  {:<8} {:<10} {:<30} {}",
            s.id,
            s.npsn,
            truncate(&s.name, 30),
            coordinate
        );
    }
}

pub fn print_geofence(result: &GeofenceResult, radius_meters: f64) {
    match (result.distance_meters, result.verified) {
        (Some(d), Some(verified)) => {
            println!("  {:<26} {d:.1} m", "distance");
            println!("  {:<26} {radius_meters:.0} m", "radius");
            println!("  {:<26} {}", "verified", if verified { "yes" } else { "no" });
        }
        _ => println!("  {:<26} indeterminate (school has no coordinate)", "verified"),
    }
    println!("  {:<26} {}", "label", result.status_label());
}

// ── Helpers ──

fn field(name: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    println!("  {:<26} {}", name, value);
}

fn print_list(header: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("{header} ({}):", items.len());
    for (i, item) in items.iter().take(MAX_LIST_ITEMS).enumerate() {
        println!("    {}. {}", i + 1, item);
    }
    if items.len() > MAX_LIST_ITEMS {
        println!("    ... and {} more", items.len() - MAX_LIST_ITEMS);
    }
    println!();
}

fn artifact_summary(artifact: &ImageArtifact) -> String {
    if artifact.is_empty() {
        return "(none)".to_string();
    }
    match artifact.mime_type() {
        Some(mime) => format!("{mime}, {} chars", artifact.as_str().len()),
        None => artifact.as_str().to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let head: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{head}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("SDN 1 Menteng", 30), "SDN 1 Menteng");
        assert_eq!(truncate("Sekolah Dasar Négeri Satu", 10), "Sekolah...");
    }

    #[test]
    fn artifact_summary_forms() {
        assert_eq!(artifact_summary(&ImageArtifact::empty()), "(none)");
        let embedded = ImageArtifact::embed("image/png", &[1, 2, 3]);
        assert!(artifact_summary(&embedded).starts_with("image/png, "));
        let remote = ImageArtifact::from_uri("https://drive.example/foto.jpg");
        assert_eq!(artifact_summary(&remote), "https://drive.example/foto.jpg");
    }
}
