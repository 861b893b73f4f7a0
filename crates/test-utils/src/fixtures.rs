//! Common test fixtures for the render dispatch tests.

/// Style documents understood by the probe engine.
pub mod probe_styles {
    /// A document the probe loads successfully.
    pub const VALID: &str = "<Map><Style name=\"probe\"/></Map>";

    /// A document the probe refuses to load.
    pub const BROKEN: &str = "<Map><broken/></Map>";

    /// A document whose render panics.
    pub const PANICS: &str = "<Map><panic/></Map>";

    /// A document whose render returns an engine error.
    pub const FAILS: &str = "<Map><fail/></Map>";
}

/// Style documents for the built-in raster engine.
pub mod raster_styles {
    /// Opaque red polygon covering x in [0, 50], y in [0, 100].
    pub const LEFT_HALF_RED: &str = r##"<?xml version="1.0" encoding="utf-8"?>
<Map background-color="transparent">
  <Style name="fill">
    <Rule>
      <PolygonSymbolizer fill="#ff0000"/>
    </Rule>
  </Style>
  <Layer name="area">
    <StyleName>fill</StyleName>
    <Datasource>
      <Feature>POLYGON ((0 0, 50 0, 50 100, 0 100, 0 0))</Feature>
    </Datasource>
  </Layer>
</Map>"##;

    /// Opaque blue polygon covering x in [0, 50], y in [0, 100].
    pub const LEFT_HALF_BLUE: &str = r##"<Map>
  <Style name="fill"><Rule><PolygonSymbolizer fill="#0000ff"/></Rule></Style>
  <Layer name="area">
    <StyleName>fill</StyleName>
    <Datasource>
      <Feature>POLYGON ((0 0, 50 0, 50 100, 0 100, 0 0))</Feature>
    </Datasource>
  </Layer>
</Map>"##;

    /// Not well-formed XML.
    pub const MALFORMED: &str = "<Map><Style name=\"fill\"><Rule></Map>";

    /// Well-formed but with nothing to draw.
    pub const EMPTY: &str = "<Map/>";
}

/// Common extents for testing.
pub mod extents {
    /// The square the raster fixtures are drawn in.
    pub const UNIT_SQUARE_100: (f64, f64, f64, f64) = (0.0, 0.0, 100.0, 100.0);

    /// Web Mercator world extent.
    pub const WEB_MERCATOR_WORLD: (f64, f64, f64, f64) = (
        -20037508.342789244,
        -20037508.342789244,
        20037508.342789244,
        20037508.342789244,
    );
}
