//! Client records

use crate::error::{Result, RoofDeskError};
use crate::export::import::read_clients;
use crate::repo::{short_id, Portal};
use crate::store::Filter;
use roofdesk_common::{format_amount, Capture, Client, Inspection, Job, Packet};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Fields accepted when adding or editing a client. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct ClientFields {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

impl ClientFields {
    fn apply(self, client: &mut Client) {
        if let Some(name) = self.name {
            client.name = name.trim().to_string();
        }
        if let Some(phone) = self.phone {
            client.phone = phone.trim().to_string();
        }
        if let Some(email) = self.email {
            client.email = email.trim().to_string();
        }
        if let Some(address) = self.address {
            client.address = address.trim().to_string();
        }
        if let Some(notes) = self.notes {
            client.notes = notes;
        }
    }
}

pub fn validate(client: &Client) -> Result<()> {
    if client.name.trim().is_empty() {
        return Err(RoofDeskError::Validation("client name is required".into()));
    }
    if !client.email.is_empty() && !client.email.contains('@') {
        return Err(RoofDeskError::Validation(format!("invalid email: {}", client.email)));
    }
    Ok(())
}

pub async fn add_client(portal: &Portal, name: &str, fields: ClientFields) -> Result<Client> {
    let mut client = Client::new(name.trim());
    fields.apply(&mut client);
    validate(&client)?;
    let stored = portal.create(&client).await?;
    info!(id = %stored.id, name = %stored.name, "client added");
    Ok(stored)
}

pub async fn update_client(portal: &Portal, id: &str, fields: ClientFields) -> Result<Client> {
    let mut client: Client = portal.find(id).await?;
    fields.apply(&mut client);
    validate(&client)?;
    portal.save(&client).await
}

pub async fn list_clients(portal: &Portal) -> Result<Vec<Client>> {
    let mut clients: Vec<Client> = portal.list(&Filter::all()).await?;
    clients.sort_by_key(|c| c.name.to_lowercase());
    Ok(clients)
}

/// Case-insensitive substring match on name, phone or email
pub fn matching<'a>(clients: &'a [Client], query: &str) -> Vec<&'a Client> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    clients
        .iter()
        .filter(|c| {
            c.name.to_lowercase().contains(&needle)
                || c.email.to_lowercase().contains(&needle)
                || (!c.phone.is_empty() && c.phone.contains(&needle))
        })
        .collect()
}

pub async fn find_clients(portal: &Portal, query: &str) -> Result<Vec<Client>> {
    let clients = list_clients(portal).await?;
    Ok(matching(&clients, query).into_iter().cloned().collect())
}

/// Resolve a client by id, id prefix or unique name match.
/// An exact (case-insensitive) name match wins over partial matches.
pub async fn resolve_client(portal: &Portal, query: &str) -> Result<Client> {
    if let Ok(client) = portal.find::<Client>(query).await {
        return Ok(client);
    }
    let clients = list_clients(portal).await?;
    pick_client(&clients, query).cloned()
}

pub fn pick_client<'a>(clients: &'a [Client], query: &str) -> Result<&'a Client> {
    let found = matching(clients, query);
    let exact: Vec<&Client> = found
        .iter()
        .copied()
        .filter(|c| c.name.eq_ignore_ascii_case(query.trim()))
        .collect();

    match (exact.len(), found.len()) {
        (1, _) => Ok(exact[0]),
        (_, 0) => Err(RoofDeskError::ClientNotFound(query.to_string())),
        (_, 1) => Ok(found[0]),
        (_, count) => Err(RoofDeskError::AmbiguousClient { query: query.to_string(), count }),
    }
}

/// Everything linked to one client
#[derive(Debug, Clone)]
pub struct ClientOverview {
    pub client: Client,
    pub packets: Vec<Packet>,
    pub inspections: Vec<Inspection>,
    pub jobs: Vec<Job>,
    pub captures: Vec<Capture>,
}

impl ClientOverview {
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty() && self.inspections.is_empty() && self.jobs.is_empty() && self.captures.is_empty()
    }
}

pub async fn overview(portal: &Portal, client: Client) -> Result<ClientOverview> {
    let by_client = Filter::all().eq("client_id", client.id.clone());
    let packets = portal.list::<Packet>(&by_client.clone().order_by("created_at", false)).await?;
    let inspections = portal.list::<Inspection>(&by_client.clone().order_by("inspected_on", false)).await?;
    let jobs = portal.list::<Job>(&by_client.clone().order_by("scheduled_on", true)).await?;
    let captures = portal.list::<Capture>(&by_client.order_by("created_at", false)).await?;
    Ok(ClientOverview { client, packets, inspections, jobs, captures })
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub added: Vec<Client>,
    /// Names already present (case-insensitive)
    pub duplicates: Vec<String>,
    /// (spreadsheet row, reason)
    pub invalid: Vec<(usize, String)>,
}

/// Add every spreadsheet row whose name is not already a client
pub async fn import_clients(portal: &Portal, path: &Path) -> Result<ImportReport> {
    let rows = read_clients(path)?;
    let mut known: HashSet<String> = list_clients(portal)
        .await?
        .into_iter()
        .map(|c| c.name.to_lowercase())
        .collect();

    let mut report = ImportReport::default();
    for row in rows {
        let key = row.name.to_lowercase();
        if known.contains(&key) {
            report.duplicates.push(row.name);
            continue;
        }
        let fields = ClientFields {
            name: None,
            phone: Some(row.phone),
            email: Some(row.email),
            address: Some(row.address),
            notes: Some(row.notes),
        };
        match add_client(portal, &row.name, fields).await {
            Ok(client) => {
                // 無効な行の名前は後続の有効な行を妨げない
                known.insert(key);
                report.added.push(client);
            }
            Err(RoofDeskError::Validation(reason)) => report.invalid.push((row.row, reason)),
            Err(e) => return Err(e),
        }
    }
    info!(added = report.added.len(), duplicates = report.duplicates.len(), "clients imported");
    Ok(report)
}

/// Text block for `client show` and the voice "open client" command
pub fn describe_overview(overview: &ClientOverview) -> String {
    let client = &overview.client;
    let mut lines = vec![format!("{} ({})", client.name, short_id(&client.id))];
    for (label, value) in [("Phone", &client.phone), ("Email", &client.email), ("Address", &client.address)] {
        if !value.is_empty() {
            lines.push(format!("  {:<8} {}", label, value));
        }
    }
    if !client.notes.trim().is_empty() {
        lines.push("  Notes:".into());
        lines.extend(client.notes.lines().map(|l| format!("    {}", l)));
    }

    lines.push(format!("  Packets ({})", overview.packets.len()));
    for p in &overview.packets {
        let amount = p.amount_cents.map(format_amount).unwrap_or_else(|| "-".into());
        lines.push(format!("    {}  {:<8} {:>12}  {}", short_id(&p.id), p.status.as_str(), amount, p.title));
    }
    lines.push(format!("  Inspections ({})", overview.inspections.len()));
    for i in &overview.inspections {
        let (high, medium, low) = i.severity_counts();
        lines.push(format!(
            "    {}  {}  {} photo(s), findings H{} M{} L{}",
            short_id(&i.id),
            i.inspected_on,
            i.photos.len(),
            high,
            medium,
            low
        ));
    }
    lines.push(format!("  Jobs ({})", overview.jobs.len()));
    for j in &overview.jobs {
        lines.push(format!("    {}  {}  {:<11} {}", short_id(&j.id), j.scheduled_on, j.status.as_str(), j.title));
    }
    lines.push(format!("  Captures ({})", overview.captures.len()));
    for c in &overview.captures {
        let tag = if c.tag.is_empty() { "(untagged)" } else { c.tag.as_str() };
        lines.push(format!("    {}  {:<5} {}", short_id(&c.id), c.kind.as_str(), tag));
    }
    lines.join("\n")
}

/// Delete a client. Linked records block the delete unless `cascade` is set,
/// in which case they are removed along with their stored files.
pub async fn delete_client(portal: &Portal, id: &str, cascade: bool) -> Result<ClientOverview> {
    let client: Client = portal.find(id).await?;
    let linked = overview(portal, client).await?;

    if !linked.is_empty() && !cascade {
        return Err(RoofDeskError::Validation(format!(
            "client '{}' has {} packet(s), {} inspection(s), {} job(s), {} capture(s); use --cascade",
            linked.client.name,
            linked.packets.len(),
            linked.inspections.len(),
            linked.jobs.len(),
            linked.captures.len()
        )));
    }

    let mut paths: Vec<String> = Vec::new();
    for packet in &linked.packets {
        paths.extend(packet.photos.iter().map(|p| p.path.clone()));
        paths.extend(packet.signature.iter().map(|s| s.path.clone()));
        portal.delete::<Packet>(&packet.id).await?;
    }
    for inspection in &linked.inspections {
        paths.extend(inspection.photos.iter().map(|p| p.path.clone()));
        portal.delete::<Inspection>(&inspection.id).await?;
    }
    for job in &linked.jobs {
        portal.delete::<Job>(&job.id).await?;
    }
    for capture in &linked.captures {
        if !capture.path.is_empty() {
            paths.push(capture.path.clone());
        }
        portal.delete::<Capture>(&capture.id).await?;
    }
    portal.objects().remove(&paths).await?;
    portal.delete::<Client>(&linked.client.id).await?;

    info!(id = %linked.client.id, files = paths.len(), "client deleted");
    Ok(linked)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clients() -> Vec<Client> {
        let mut a = Client::new("John Smith");
        a.email = "john@example.com".into();
        let mut b = Client::new("Smithfield Church");
        b.phone = "555-0100".into();
        let c = Client::new("Maria Lopez");
        vec![a, b, c]
    }

    #[test]
    fn test_matching_case_insensitive() {
        let list = clients();
        assert_eq!(matching(&list, "smith").len(), 2);
        assert_eq!(matching(&list, "LOPEZ").len(), 1);
        assert_eq!(matching(&list, "555-0100")[0].name, "Smithfield Church");
        assert!(matching(&list, "  ").is_empty());
    }

    #[test]
    fn test_pick_client_exact_name_wins() {
        let list = clients();
        assert_eq!(pick_client(&list, "john smith").unwrap().name, "John Smith");
        assert!(matches!(
            pick_client(&list, "smith"),
            Err(RoofDeskError::AmbiguousClient { count: 2, .. })
        ));
        assert!(matches!(pick_client(&list, "nobody"), Err(RoofDeskError::ClientNotFound(_))));
        assert_eq!(pick_client(&list, "maria").unwrap().name, "Maria Lopez");
    }

    #[test]
    fn test_describe_overview() {
        let mut client = Client::new("John Smith");
        client.phone = "555-0100".into();
        client.notes = "gate code 1234".into();
        let mut packet = Packet::new(&client.id, "Full tear-off");
        packet.amount_cents = Some(1_250_000);
        let overview = ClientOverview {
            client,
            packets: vec![packet],
            inspections: Vec::new(),
            jobs: Vec::new(),
            captures: Vec::new(),
        };
        let text = describe_overview(&overview);
        assert!(text.starts_with("John Smith ("));
        assert!(text.contains("555-0100"));
        assert!(text.contains("gate code 1234"));
        assert!(text.contains("$12,500.00"));
        assert!(text.contains("Jobs (0)"));
        assert!(!text.contains("Email"));
    }

    #[test]
    fn test_validate() {
        let mut client = Client::new("  ");
        assert!(validate(&client).is_err());
        client.name = "Ann".into();
        client.email = "not-an-email".into();
        assert!(validate(&client).is_err());
        client.email = "ann@example.com".into();
        assert!(validate(&client).is_ok());
    }
}
