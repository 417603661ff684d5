use std::collections::{BTreeMap, HashSet};
use std::fmt::Display;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use vertexflow_common::error::{VertexFlowError, VertexFlowResult};
use vertexflow_common::types::{Edge, VertexInput};

pub type EdgeRow = (u64, u64, u8);

/// Vertex row with no initial value; algorithms assign their own at superstep 0.
pub type GraphInput = VertexInput<u64, (), u8>;

fn parse_field<T>(field: Option<&str>, what: &str, line: usize) -> VertexFlowResult<T>
where
    T: std::str::FromStr,
    T::Err: Display,
{
    field
        .ok_or_else(|| VertexFlowError::InvalidArgument(format!("line {line}: {what} missing")))?
        .trim()
        .parse()
        .map_err(|e| VertexFlowError::InvalidArgument(format!("line {line}: {what} parse: {e}")))
}

pub fn read_edges_csv(path: impl AsRef<Path>, default_value: u8) -> VertexFlowResult<Vec<EdgeRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_path(path)
        .map_err(|e| VertexFlowError::Io(e.into()))?;

    let mut out = Vec::new();
    for (i, rec) in rdr.records().enumerate() {
        let rec = rec.map_err(|e| VertexFlowError::Internal(format!("csv read: {e}")))?;
        let line = i + 1;
        let src = parse_field(rec.get(0), "edge src", line)?;
        let dst = parse_field(rec.get(1), "edge dst", line)?;
        let value = match rec.get(2) {
            Some(v) if !v.trim().is_empty() => parse_field(Some(v), "edge value", line)?,
            _ => default_value,
        };
        out.push((src, dst, value));
    }
    Ok(out)
}

/// Reads whitespace separated `src dst` pairs, skipping blank and `#` lines
/// (the SNAP format, e.g. wiki-Vote.txt). Edge values default to 0.
pub fn read_edge_list(path: impl AsRef<Path>) -> VertexFlowResult<Vec<EdgeRow>> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let mut out = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let s = line.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let mut it = s.split_whitespace();
        let src = parse_field(it.next(), "edge src", i + 1)?;
        let dst = parse_field(it.next(), "edge dst", i + 1)?;
        out.push((src, dst, 0));
    }
    Ok(out)
}

/// Reads `v n:w n:w ...` adjacency rows. A bare `n` means weight 0.
pub fn read_adjacency(path: impl AsRef<Path>) -> VertexFlowResult<Vec<GraphInput>> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let mut out = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let s = line.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let line_no = i + 1;
        let mut it = s.split_whitespace();
        let id = parse_field(it.next(), "vertex id", line_no)?;
        let mut edges = Vec::new();
        for token in it {
            let (target, value) = match token.split_once(':') {
                Some((t, w)) => (
                    parse_field(Some(t), "neighbor id", line_no)?,
                    parse_field(Some(w), "edge value", line_no)?,
                ),
                None => (parse_field(Some(token), "neighbor id", line_no)?, 0),
            };
            edges.push(Edge::new(target, value));
        }
        out.push(VertexInput::new(id, (), edges));
    }
    Ok(out)
}

/// Groups edge rows by source. Every endpoint becomes a vertex, so sinks are
/// loaded with no edges. With `symmetric` each edge is also added reversed.
/// Duplicate edges and self loops are dropped; output is sorted by id.
pub fn edges_to_inputs(edges: &[EdgeRow], symmetric: bool) -> Vec<GraphInput> {
    let mut adjacency: BTreeMap<u64, Vec<Edge<u64, u8>>> = BTreeMap::new();
    let mut seen: HashSet<(u64, u64)> = HashSet::new();
    let mut add = |adjacency: &mut BTreeMap<u64, Vec<Edge<u64, u8>>>, src, dst, value| {
        if seen.insert((src, dst)) {
            adjacency.entry(src).or_default().push(Edge::new(dst, value));
        }
    };

    for &(src, dst, value) in edges {
        adjacency.entry(src).or_default();
        adjacency.entry(dst).or_default();
        if src == dst {
            continue;
        }
        add(&mut adjacency, src, dst, value);
        if symmetric {
            add(&mut adjacency, dst, src, value);
        }
    }

    adjacency
        .into_iter()
        .map(|(id, edges)| VertexInput::new(id, (), edges))
        .collect()
}

pub fn write_vertices_csv<V, I>(path: impl AsRef<Path>, vertices: I) -> VertexFlowResult<usize>
where
    V: Display,
    I: IntoIterator<Item = (u64, V)>,
{
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| VertexFlowError::Io(e.into()))?;
    let mut written = 0;
    for (id, value) in vertices {
        wtr.write_record([id.to_string(), value.to_string()])
            .map_err(|e| VertexFlowError::Internal(format!("csv write: {e}")))?;
        written += 1;
    }
    wtr.flush()?;
    Ok(written)
}

pub fn append_timing(path: impl AsRef<Path>, metric: &str, seconds: f64) -> VertexFlowResult<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let mut w = BufWriter::new(file);
    writeln!(w, "{metric},{seconds:.3}")?;
    w.flush()?;
    Ok(())
}
