use geoattend::geo::{Coordinate, GeofenceArea, EARTH_RADIUS_M};
use ratatui::{
    style::{Color, Style},
    text::Span,
    widgets::{
        canvas::{Canvas, Circle, Points, Rectangle},
        Block, Borders,
    },
};

/// Local east/north offset in meters from `origin` (equirectangular, fine at office scale)
pub fn project(point: Coordinate, origin: Coordinate) -> (f64, f64) {
    let x = (point.longitude - origin.longitude).to_radians()
        * origin.latitude.to_radians().cos()
        * EARTH_RADIUS_M;
    let y = (point.latitude - origin.latitude).to_radians() * EARTH_RADIUS_M;
    (x, y)
}

/// Square view half-extent in meters that fits the area and the last fix
pub fn view_extent(area: &GeofenceArea, fix: Option<Coordinate>) -> f64 {
    let origin = area.center();
    let mut extent: f64 = match *area {
        GeofenceArea::Circle { radius_meters, .. } => radius_meters,
        GeofenceArea::Box {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        } => {
            let (x, y) = project(Coordinate::new(lat_max, lon_max), origin);
            let (x0, y0) = project(Coordinate::new(lat_min, lon_min), origin);
            x.abs().max(y.abs()).max(x0.abs()).max(y0.abs())
        }
    };
    if let Some(fix) = fix {
        let (x, y) = project(fix, origin);
        extent = extent.max(x.abs()).max(y.abs());
    }
    (extent * 1.5).max(1.0)
}

pub fn geofence_canvas<'a>(
    area: GeofenceArea,
    fix: Option<Coordinate>,
    outside: bool,
) -> Canvas<'a, impl Fn(&mut ratatui::widgets::canvas::Context<'_>) + 'a> {
    let origin = area.center();
    let extent = view_extent(&area, fix);
    let fence_color = Color::Rgb(33, 150, 243);

    Canvas::default()
        .block(Block::default().borders(Borders::ALL).title("Office Area"))
        .x_bounds([-extent, extent])
        .y_bounds([-extent, extent])
        .paint(move |ctx| {
            match area {
                GeofenceArea::Circle { radius_meters, .. } => ctx.draw(&Circle {
                    x: 0.0,
                    y: 0.0,
                    radius: radius_meters,
                    color: fence_color,
                }),
                GeofenceArea::Box {
                    lat_min, lon_min, ..
                } => {
                    let (x, y) = project(Coordinate::new(lat_min, lon_min), origin);
                    ctx.draw(&Rectangle {
                        x,
                        y,
                        width: -2.0 * x,
                        height: -2.0 * y,
                        color: fence_color,
                    })
                }
            }
            ctx.print(0.0, 0.0, Span::styled("▣ Office", Style::default().fg(fence_color)));

            if let Some(fix) = fix {
                let (x, y) = project(fix, origin);
                let color = if outside { Color::Red } else { Color::Green };
                ctx.draw(&Points {
                    coords: &[(x, y)],
                    color,
                });
                ctx.print(x, y, Span::styled("● You", Style::default().fg(color)));
            }
        })
}
