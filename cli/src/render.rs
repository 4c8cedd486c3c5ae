//! Plain-text rendering of a settled discovery view.

use std::fmt::Write;

use proxima_engine::proxima_types::{ProfessionalRecord, truncate_with_ellipsis};
use proxima_engine::{
    DiscoveryView, EmptyState, LocationStatus, TeamStatus, format_directory_error,
};

const BIO_WIDTH: usize = 72;

pub fn render_view(view: &DiscoveryView) -> String {
    let mut out = String::new();

    match view.location {
        LocationStatus::Located(fix) => {
            let _ = writeln!(
                out,
                "Near {} (via {}), within {} km",
                fix.coordinate,
                fix.source,
                view.radius.get()
            );
        }
        LocationStatus::Unavailable => {
            out.push_str(
                "Location unavailable. Allow location access, or add a city to your profile.\n",
            );
            return out;
        }
        LocationStatus::Pending => {
            out.push_str("Still locating.\n");
            return out;
        }
    }

    if let Some(error) = &view.error {
        let _ = writeln!(out, "{}", format_directory_error(error));
        return out;
    }

    if view.team == TeamStatus::Failed {
        out.push_str(
            "Could not load the project team; some professionals shown may already be on it.\n",
        );
    }

    match view.empty_state {
        Some(EmptyState::NoMatches) => out.push_str("No professionals found nearby.\n"),
        Some(EmptyState::AllEngaged { hidden }) => {
            let _ = writeln!(
                out,
                "All {hidden} nearby professionals are already on this project."
            );
        }
        None => {
            for record in &view.professionals {
                render_record(&mut out, record);
            }
        }
    }
    out
}

fn render_record(out: &mut String, record: &ProfessionalRecord) {
    let _ = write!(out, "{:>7.1} km  {}  [{}", record.distance_km, record.name, record.category);
    if let Some(sub) = &record.sub_category {
        let _ = write!(out, " / {sub}");
    }
    out.push(']');
    if let Some(rating) = record.rating {
        let _ = write!(out, "  {rating:.1}*");
    }
    if let Some(years) = record.experience_years {
        let _ = write!(out, "  {years}y");
    }
    out.push('\n');
    if let Some(bio) = record.bio.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
        let _ = writeln!(out, "            {}", truncate_with_ellipsis(bio, BIO_WIDTH));
    }
}
