use anyhow::{Result, bail};
use chrono::Local;

use sugartrack_core::models::{Category, NewRecord, Record, Unit, validate_value};
use sugartrack_core::service::SugarService;
use sugartrack_core::units::{format_value, secondary_display, to_alternate_unit};

use super::helpers::{json_error, parse_timestamp, print_records_table, resolve_id, short_id};

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_add(
    svc: &mut SugarService,
    value: f64,
    category: Category,
    unit: Option<Unit>,
    notes: Option<String>,
    at: Option<&str>,
    convert: bool,
    json: bool,
) -> Result<()> {
    let value = validate_value(value)?;
    let unit = unit.unwrap_or(svc.preferences().default_unit);
    let (value, unit) = if convert {
        to_alternate_unit(value, unit)
    } else {
        (value, unit)
    };

    let new = NewRecord {
        timestamp: parse_timestamp(at)?,
        category,
        value,
        unit,
        notes: notes.unwrap_or_default(),
    };
    let record = svc.add_record(new)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        println!(
            "Logged {} ({}) for {} [{}]",
            format_value(record.value, record.unit),
            secondary_display(record.value, record.unit),
            record.category,
            short_id(&record.id)
        );
    }
    Ok(())
}

pub(crate) fn cmd_list(
    svc: &SugarService,
    search: Option<&str>,
    category: Option<Category>,
    json: bool,
) -> Result<()> {
    let records = svc.search(search.unwrap_or(""), category, &Local);

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else if records.is_empty() {
        if svc.records().is_empty() {
            eprintln!("No readings yet. Use `sugartrack add` to log one.");
        } else {
            eprintln!("No readings match.");
        }
    } else {
        print_records_table(&records);
    }
    Ok(())
}

/// Field changes requested by `edit`; `None` leaves the field as it is.
#[derive(Debug, Default)]
pub(crate) struct RecordEdit {
    pub value: Option<f64>,
    pub unit: Option<Unit>,
    pub category: Option<Category>,
    pub notes: Option<String>,
    pub at: Option<String>,
    pub convert: bool,
}

impl RecordEdit {
    fn is_empty(&self) -> bool {
        self.value.is_none()
            && self.unit.is_none()
            && self.category.is_none()
            && self.notes.is_none()
            && self.at.is_none()
            && !self.convert
    }

    fn apply(self, record: &Record) -> Result<Record> {
        let mut updated = record.clone();
        if let Some(v) = self.value {
            updated.value = validate_value(v)?;
        }
        if let Some(u) = self.unit {
            updated.unit = u;
        }
        if let Some(c) = self.category {
            updated.category = c;
        }
        if let Some(n) = self.notes {
            updated.notes = n;
        }
        if let Some(at) = self.at.as_deref() {
            updated.timestamp = parse_timestamp(Some(at))?;
        }
        if self.convert {
            updated = updated.converted();
        }
        Ok(updated)
    }
}

pub(crate) fn cmd_edit(svc: &mut SugarService, id: &str, edit: RecordEdit, json: bool) -> Result<()> {
    if edit.is_empty() {
        bail!(
            "Nothing to update. Provide at least one of --value, --unit, --category, --notes, --at or --convert"
        );
    }

    let Some(existing) = resolve_id(svc.records(), id)?.cloned() else {
        if json {
            println!("{}", serde_json::json!({ "id": id, "updated": false }));
        } else {
            println!("No reading with id {id}; nothing changed");
        }
        return Ok(());
    };

    let updated = edit.apply(&existing)?;
    svc.update_record(updated.clone())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&updated)?);
    } else {
        println!(
            "Updated {}: {} ({}) for {}",
            short_id(&updated.id),
            format_value(updated.value, updated.unit),
            secondary_display(updated.value, updated.unit),
            updated.category
        );
    }
    Ok(())
}

pub(crate) fn cmd_delete(svc: &mut SugarService, ids: &[String], json: bool) -> Result<()> {
    if ids.is_empty() {
        bail!("Provide at least one id to delete");
    }

    let mut found = Vec::new();
    let mut missing = Vec::new();
    for id in ids {
        match resolve_id(svc.records(), id)? {
            Some(r) => found.push(r.id.clone()),
            None => missing.push(id.as_str()),
        }
    }

    let removed = match found.as_slice() {
        [] => 0,
        [one] => usize::from(svc.delete_record(one)?),
        many => svc.delete_records(many)?,
    };

    if json {
        println!(
            "{}",
            serde_json::json!({ "deleted": found, "count": removed, "missing": missing })
        );
    } else {
        match removed {
            0 => {}
            1 => println!("Deleted 1 reading"),
            n => println!("Deleted {n} readings"),
        }
        for id in &missing {
            println!("No reading with id {id}; nothing changed");
        }
    }
    Ok(())
}

pub(crate) fn cmd_convert(value: f64, unit: Unit, json: bool) -> Result<()> {
    let value = match validate_value(value) {
        Ok(v) => v,
        Err(e) if json => {
            println!("{}", json_error(&e.to_string()));
            return Ok(());
        }
        Err(e) => return Err(e),
    };
    let (converted, other) = to_alternate_unit(value, unit);

    if json {
        println!(
            "{}",
            serde_json::json!({
                "value": value,
                "unit": unit,
                "converted": converted,
                "converted_unit": other,
            })
        );
    } else {
        println!(
            "{} = {}",
            format_value(value, unit),
            secondary_display(value, unit)
        );
    }
    Ok(())
}
