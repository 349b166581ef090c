//! Scenario tests spanning the graph, transforms, components and caches
