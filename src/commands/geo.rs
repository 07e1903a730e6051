//! GEOADD, GEOPOS, GEODIST and GEOSEARCH over sorted sets scored by geohash.

use crate::{
    commands::{Command, CommandError, CommandFuture, CommandResult},
    connection::Session,
    key_value_store::{geo::Coordinates, SortedSet},
    resp::RespValue,
    server::RedisServer,
};

fn parse_coordinate(value: &str) -> Result<f64, CommandError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|coordinate| coordinate.is_finite())
        .ok_or(CommandError::NotAFloat)
}

fn parse_coordinates(longitude: &str, latitude: &str) -> Result<Coordinates, CommandError> {
    let longitude = parse_coordinate(longitude)?;
    let latitude = parse_coordinate(latitude)?;

    Coordinates::new(longitude, latitude)
        .ok_or(CommandError::InvalidCoordinates(longitude, latitude))
}

/// Meters per unit.
fn parse_unit(unit: &str) -> Result<f64, CommandError> {
    match unit.to_lowercase().as_str() {
        "m" => Ok(1.0),
        "km" => Ok(1000.0),
        "mi" => Ok(1609.34),
        "ft" => Ok(0.3048),
        _ => Err(CommandError::UnsupportedUnit),
    }
}

fn position(set: &SortedSet, member: &str) -> Option<Coordinates> {
    set.score(member)
        .map(|score| Coordinates::decode(score as u64))
}

pub struct GeoAddArguments {
    key: String,
    members: Vec<(Coordinates, String)>,
}

impl GeoAddArguments {
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        let [key, triples @ ..] = arguments else {
            return Err(CommandError::WrongNumberOfArguments("geoadd".to_string()));
        };

        if triples.is_empty() || triples.len() % 3 != 0 {
            return Err(CommandError::WrongNumberOfArguments("geoadd".to_string()));
        }

        let members = triples
            .chunks_exact(3)
            .map(|triple| -> Result<(Coordinates, String), CommandError> {
                let coordinates = parse_coordinates(&triple[0], &triple[1])?;
                Ok((coordinates, triple[2].clone()))
            })
            .collect::<Result<Vec<_>, CommandError>>()?;

        Ok(Self {
            key: key.clone(),
            members,
        })
    }
}

/// Returns how many members were newly added; moved members do not count.
pub fn geoadd(server: &RedisServer, arguments: &[String]) -> Result<CommandResult, CommandError> {
    let geoadd_arguments = GeoAddArguments::parse(arguments)?;

    let added = server.store.upsert_sorted_set(&geoadd_arguments.key, |set| {
        geoadd_arguments
            .members
            .into_iter()
            .filter(|(coordinates, member)| set.insert(member.clone(), coordinates.encode() as f64))
            .count()
    })?;

    Ok(CommandResult::Response(RespValue::Integer(added as i64)))
}

/// One `[longitude, latitude]` pair per member, or a null array where the member is
/// missing.
pub fn geopos(server: &RedisServer, arguments: &[String]) -> Result<CommandResult, CommandError> {
    let [key, members @ ..] = arguments else {
        return Err(CommandError::WrongNumberOfArguments("geopos".to_string()));
    };

    if members.is_empty() {
        return Err(CommandError::WrongNumberOfArguments("geopos".to_string()));
    }

    let positions = server
        .store
        .with_sorted_set(key, |set| {
            members
                .iter()
                .map(|member| position(set, member))
                .collect::<Vec<_>>()
        })
        .unwrap_or_else(|| vec![None; members.len()]);

    Ok(CommandResult::Response(RespValue::Array(
        positions
            .into_iter()
            .map(|position| match position {
                Some(coordinates) => RespValue::array_from_strings([
                    coordinates.longitude.to_string(),
                    coordinates.latitude.to_string(),
                ]),
                None => RespValue::NullArray,
            })
            .collect(),
    )))
}

pub fn geodist(server: &RedisServer, arguments: &[String]) -> Result<CommandResult, CommandError> {
    let (key, first, second, unit) = match arguments {
        [key, first, second] => (key, first, second, 1.0),
        [key, first, second, unit] => (key, first, second, parse_unit(unit)?),
        _ => return Err(CommandError::WrongNumberOfArguments("geodist".to_string())),
    };

    let distance = server
        .store
        .with_sorted_set(key, |set| {
            let first = position(set, first)?;
            let second = position(set, second)?;
            Some(first.distance_to(&second))
        })
        .flatten();

    Ok(CommandResult::Response(match distance {
        Some(meters) => RespValue::BulkString(format!("{:.4}", meters / unit)),
        None => RespValue::NullBulkString,
    }))
}

#[derive(Debug, PartialEq)]
pub enum SearchOrigin {
    Position(Coordinates),
    Member(String),
}

/// Sizes are kept in meters.
#[derive(Debug, PartialEq)]
pub enum SearchShape {
    Radius(f64),
    Box { width: f64, height: f64 },
}

#[derive(Debug, PartialEq)]
pub enum SearchOrder {
    Unsorted,
    Ascending,
    Descending,
}

#[derive(Debug, PartialEq)]
pub struct GeoSearchArguments {
    key: String,
    origin: SearchOrigin,
    shape: SearchShape,
    order: SearchOrder,
    count: Option<usize>,
}

impl GeoSearchArguments {
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        let [key, options @ ..] = arguments else {
            return Err(CommandError::WrongNumberOfArguments("geosearch".to_string()));
        };

        let mut origin = None;
        let mut shape = None;
        let mut order = SearchOrder::Unsorted;
        let mut count = None;

        let mut remaining = options;
        while let [option, rest @ ..] = remaining {
            remaining = match (option.to_uppercase().as_str(), rest) {
                ("FROMLONLAT", [longitude, latitude, rest @ ..]) if origin.is_none() => {
                    origin = Some(SearchOrigin::Position(parse_coordinates(longitude, latitude)?));
                    rest
                }
                ("FROMMEMBER", [member, rest @ ..]) if origin.is_none() => {
                    origin = Some(SearchOrigin::Member(member.clone()));
                    rest
                }
                ("BYRADIUS", [radius, unit, rest @ ..]) if shape.is_none() => {
                    let radius = parse_distance(radius)?;
                    shape = Some(SearchShape::Radius(radius * parse_unit(unit)?));
                    rest
                }
                ("BYBOX", [width, height, unit, rest @ ..]) if shape.is_none() => {
                    let (width, height) = (parse_distance(width)?, parse_distance(height)?);
                    let unit = parse_unit(unit)?;
                    shape = Some(SearchShape::Box {
                        width: width * unit,
                        height: height * unit,
                    });
                    rest
                }
                ("ASC", rest) => {
                    order = SearchOrder::Ascending;
                    rest
                }
                ("DESC", rest) => {
                    order = SearchOrder::Descending;
                    rest
                }
                ("COUNT", [limit, rest @ ..]) => {
                    let limit = limit
                        .parse::<usize>()
                        .ok()
                        .filter(|limit| *limit > 0)
                        .ok_or(CommandError::NotAnInteger)?;
                    count = Some(limit);
                    rest
                }
                _ => return Err(CommandError::SyntaxError),
            };
        }

        match (origin, shape) {
            (Some(origin), Some(shape)) => Ok(Self {
                key: key.clone(),
                origin,
                shape,
                order,
                count,
            }),
            _ => Err(CommandError::SyntaxError),
        }
    }
}

fn parse_distance(value: &str) -> Result<f64, CommandError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|distance| distance.is_finite() && *distance >= 0.0)
        .ok_or(CommandError::NotAFloat)
}

impl SearchShape {
    fn contains(&self, center: &Coordinates, point: &Coordinates) -> Option<f64> {
        let distance = center.distance_to(point);

        let inside = match self {
            SearchShape::Radius(radius) => distance <= *radius,
            SearchShape::Box { width, height } => {
                let north_south = center.distance_to(&Coordinates {
                    longitude: center.longitude,
                    latitude: point.latitude,
                });
                let east_west = center.distance_to(&Coordinates {
                    longitude: point.longitude,
                    latitude: center.latitude,
                });

                north_south <= height / 2.0 && east_west <= width / 2.0
            }
        };

        inside.then_some(distance)
    }
}

/// Members whose stored position lies inside the shape around the origin.
pub fn geosearch(server: &RedisServer, arguments: &[String]) -> Result<CommandResult, CommandError> {
    let search = GeoSearchArguments::parse(arguments)?;

    let found = server
        .store
        .with_sorted_set(&search.key, |set| {
            let center = match &search.origin {
                SearchOrigin::Position(coordinates) => Some(*coordinates),
                SearchOrigin::Member(member) => position(set, member),
            }?;

            Some(
                set.iter()
                    .filter_map(|(member, score)| {
                        let point = Coordinates::decode(score as u64);
                        search
                            .shape
                            .contains(&center, &point)
                            .map(|distance| (member.to_string(), distance))
                    })
                    .collect::<Vec<_>>(),
            )
        })
        .flatten();

    let Some(mut found) = found else {
        if let SearchOrigin::Member(_) = search.origin {
            if server.store.with_sorted_set(&search.key, |_| ()).is_some() {
                return Err(CommandError::MemberNotFound);
            }
        }
        return Ok(CommandResult::Response(RespValue::Array(Vec::new())));
    };

    match search.order {
        SearchOrder::Unsorted => {}
        SearchOrder::Ascending => found.sort_by(|a, b| a.1.total_cmp(&b.1)),
        SearchOrder::Descending => found.sort_by(|a, b| b.1.total_cmp(&a.1)),
    }

    if let Some(count) = search.count {
        found.truncate(count);
    }

    Ok(CommandResult::Response(RespValue::array_from_strings(
        found.into_iter().map(|(member, _)| member),
    )))
}

pub struct GeoAdd;

impl Command for GeoAdd {
    fn name(&self) -> &'static str {
        "GEOADD"
    }

    fn is_write(&self) -> bool {
        true
    }

    fn execute<'a>(
        &'a self,
        server: &'a RedisServer,
        _session: &'a Session,
        arguments: &'a [String],
    ) -> CommandFuture<'a> {
        Box::pin(async move { geoadd(server, arguments) })
    }
}

pub struct GeoPos;

impl Command for GeoPos {
    fn name(&self) -> &'static str {
        "GEOPOS"
    }

    fn execute<'a>(
        &'a self,
        server: &'a RedisServer,
        _session: &'a Session,
        arguments: &'a [String],
    ) -> CommandFuture<'a> {
        Box::pin(async move { geopos(server, arguments) })
    }
}

pub struct GeoDist;

impl Command for GeoDist {
    fn name(&self) -> &'static str {
        "GEODIST"
    }

    fn execute<'a>(
        &'a self,
        server: &'a RedisServer,
        _session: &'a Session,
        arguments: &'a [String],
    ) -> CommandFuture<'a> {
        Box::pin(async move { geodist(server, arguments) })
    }
}

pub struct GeoSearch;

impl Command for GeoSearch {
    fn name(&self) -> &'static str {
        "GEOSEARCH"
    }

    fn execute<'a>(
        &'a self,
        server: &'a RedisServer,
        _session: &'a Session,
        arguments: &'a [String],
    ) -> CommandFuture<'a> {
        Box::pin(async move { geosearch(server, arguments) })
    }
}
