use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use heapview_types::{MapTypePolicy, ObjectDiagram, ObjectId, OdLink, OdObject, simple_type_name};

const HEADER: &str = "@startuml\n!pragma layout smetana\n";
const FOOTER: &str = "@enduml\n";
const PRIMITIVES_TITLE: &str = "PrimitiveVariables";
const PRIMITIVES_ALIAS: &str = "primitiveVariables";
const ENTRY_KEY: &str = "key";
const ENTRY_VALUE: &str = "value";
const NULL: &str = "null";

/// Renders a diagram as a PlantUML object diagram.
///
/// Output depends only on the diagram's sequence order, so equal diagrams
/// render to equal text. Objects whose type `maps` recognizes become `map`
/// blocks built from their entry nodes; the entry nodes themselves and the
/// links into them are folded into that block.
pub fn to_plantuml(diagram: &ObjectDiagram, maps: &MapTypePolicy) -> String {
    let mut out = String::from(HEADER);
    let index = DiagramIndex::new(diagram);

    let map_ids: HashSet<ObjectId> = diagram
        .objects
        .iter()
        .filter(|object| maps.is_map_type(&object.type_name))
        .map(|object| object.id)
        .collect();
    let entry_ids: HashSet<ObjectId> = diagram
        .links
        .iter()
        .filter(|link| map_ids.contains(&link.from))
        .map(|link| link.to)
        .collect();

    write_primitive_roots(&mut out, diagram);

    for object in &diagram.objects {
        if entry_ids.contains(&object.id) && !map_ids.contains(&object.id) {
            continue;
        }
        if map_ids.contains(&object.id) {
            write_map(&mut out, &index, object);
        } else {
            write_object(&mut out, object);
        }
    }

    for link in &diagram.links {
        if map_ids.contains(&link.from) || entry_ids.contains(&link.from) {
            continue;
        }
        let _ = writeln!(out, "{} --> {} : {}", link.from, link.to, link.label);
    }

    out.push_str(FOOTER);
    out
}

fn write_primitive_roots(out: &mut String, diagram: &ObjectDiagram) {
    if diagram.primitive_root_values.is_empty() {
        return;
    }
    let mut values: Vec<_> = diagram.primitive_root_values.iter().collect();
    values.sort_by(|a, b| a.name.cmp(&b.name));

    let _ = writeln!(out, "object \"{PRIMITIVES_TITLE}\" as {PRIMITIVES_ALIAS} {{");
    for value in values {
        let _ = writeln!(out, "{}={}", value.name, value.value);
    }
    out.push_str("}\n");
}

fn write_object(out: &mut String, object: &OdObject) {
    let _ = write!(
        out,
        "object \"{}:{}\" as {}",
        object.label,
        simple_type_name(&object.type_name),
        object.id
    );
    if object.attributes.is_empty() {
        out.push('\n');
        return;
    }
    out.push_str(" {\n");
    for attribute in &object.attributes {
        let _ = writeln!(out, "{}={}", attribute.name, attribute.value);
    }
    out.push_str("}\n");
}

/// Lookups by id, built once per render.
struct DiagramIndex<'a> {
    objects: HashMap<ObjectId, &'a OdObject>,
    outgoing: HashMap<ObjectId, Vec<&'a OdLink>>,
}

impl<'a> DiagramIndex<'a> {
    fn new(diagram: &'a ObjectDiagram) -> Self {
        let mut objects = HashMap::with_capacity(diagram.objects.len());
        for object in &diagram.objects {
            objects.entry(object.id).or_insert(object);
        }
        let mut outgoing: HashMap<ObjectId, Vec<&'a OdLink>> = HashMap::new();
        for link in &diagram.links {
            outgoing.entry(link.from).or_default().push(link);
        }
        Self { objects, outgoing }
    }

    fn object(&self, id: ObjectId) -> Option<&'a OdObject> {
        self.objects.get(&id).copied()
    }

    fn outgoing(&self, id: ObjectId) -> &[&'a OdLink] {
        self.outgoing.get(&id).map(Vec::as_slice).unwrap_or_default()
    }
}

fn write_map(out: &mut String, index: &DiagramIndex<'_>, map: &OdObject) {
    let _ = writeln!(
        out,
        "map \"{}:{}\" as {} {{",
        map.label,
        simple_type_name(&map.type_name),
        map.id
    );
    for slot in index.outgoing(map.id) {
        let Some(entry) = index.object(slot.to) else {
            continue;
        };
        let key = entry_part(index, entry, ENTRY_KEY);
        match entry_part(index, entry, ENTRY_VALUE) {
            EntryPart::Reference(target) => {
                let _ = writeln!(out, "{} *-> {}", key.text(), target);
            }
            value => {
                let _ = writeln!(out, "{} => {}", key.text(), value.text());
            }
        }
    }
    out.push_str("}\n");
}

enum EntryPart<'a> {
    Text(&'a str),
    Reference(ObjectId),
    Missing,
}

impl EntryPart<'_> {
    fn text(&self) -> String {
        match self {
            Self::Text(text) => text.to_string(),
            Self::Reference(id) => id.to_string(),
            Self::Missing => NULL.to_string(),
        }
    }
}

/// Finds an entry's key or value: a primitive attribute first, otherwise a
/// link to the object it refers to.
fn entry_part<'a>(index: &DiagramIndex<'a>, entry: &'a OdObject, name: &str) -> EntryPart<'a> {
    if let Some(attribute) = entry.attribute(name) {
        return EntryPart::Text(&attribute.value);
    }
    index
        .outgoing(entry.id)
        .iter()
        .find(|link| link.label == name)
        .map_or(EntryPart::Missing, |link| EntryPart::Reference(link.to))
}
